use std::path::PathBuf;

use mmbridge_core::{
    Bridge, BridgeError, ErrorKind, GuestSymbol, RuntimeSettings, Settings, LIB_MODE_FLAG,
    MIN_FORMAT_VERSION,
};
use mmbridge_script::QuickJsSession;
use serde_json::{json, Value};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn ready() -> Bridge<QuickJsSession> {
    let mut bridge = Bridge::new();
    bridge.init(fixture("mmagedit.js")).expect("init");
    bridge
}

fn loaded() -> Bridge<QuickJsSession> {
    let mut bridge = ready();
    bridge.load_rom("base.nes").expect("load_rom");
    bridge
}

fn parse(json: &str) -> Value {
    serde_json::from_str(json).expect("valid JSON from guest")
}

#[test]
fn init_reports_format_version() {
    let mut bridge = ready();
    assert!(!bridge.error_occurred());

    let version = bridge.version_int().expect("version");
    assert_eq!(version, 202104010000);
    assert!(version >= MIN_FORMAT_VERSION);
    assert_eq!(
        bridge.name_version_date().expect("name"),
        "MMagEdit v1.21 (2021-04-01)"
    );
    assert!(bridge.end().is_ok());
}

#[test]
fn script_runs_in_library_mode() {
    let bridge = ready();
    let session = bridge.session().expect("session");
    assert!(session.decodes_exceptions());

    let args: Vec<String> = session.context().with(|ctx| {
        ctx.globals()
            .get("scriptArgs")
            .expect("scriptArgs is set")
    });
    assert_eq!(args.len(), 2);
    assert!(args[0].ends_with("mmagedit.js"));
    assert_eq!(args[1], LIB_MODE_FLAG);
}

#[test]
fn chr_selection_scenario() {
    let mut bridge = loaded();
    let json = bridge.get_state_select(".chr[0][0:2]").expect("select");
    let value = parse(&json);
    assert_eq!(value.as_array().map(Vec::len), Some(2));
    assert_eq!(value, json!([[0, 1], [2, 3]]));
    assert!(bridge.end().is_ok());
}

#[test]
fn state_round_trip_is_idempotent() {
    let mut bridge = loaded();
    bridge.load_hack("hack.txt").expect("load_hack");

    let before = bridge.get_state().expect("state");
    assert_eq!(bridge.get_state_select("").expect("state"), before);

    bridge.apply_state(&before).expect("apply");
    let after = bridge.get_state().expect("state");
    assert_eq!(parse(&before), parse(&after));
    assert_eq!(parse(&after)["title"], json!("hacked"));
}

#[test]
fn applied_state_is_visible() {
    let mut bridge = loaded();
    let mut state = parse(&bridge.get_state().expect("state"));
    state["title"] = json!("edited");
    state["chr"] = json!([[[9, 9]]]);

    bridge.apply_state(&state.to_string()).expect("apply");
    assert_eq!(bridge.get_state_select(".title").expect("select"), "\"edited\"");
    assert_eq!(parse(&bridge.get_state_select(".chr[0][0]").expect("select")), json!([9, 9]));
}

#[test]
fn invalid_state_json_is_a_domain_error() {
    let mut bridge = loaded();
    let err = bridge.apply_state("{not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuestDomain);
    assert!(bridge.take_error().starts_with("invalid JSON"));
}

#[test]
fn state_before_rom_is_null() {
    let mut bridge = ready();
    assert_eq!(bridge.get_state().expect("state"), "null");

    // Selecting into a null document raises inside the guest.
    let err = bridge.get_state_select(".chr").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuestException);
    assert!(bridge.take_error().contains("TypeError"));
}

#[test]
fn write_hack_passes_overwrite_flag() {
    let mut bridge = loaded();

    bridge.write_hack("out.txt", true).expect("write_hack");
    assert_eq!(
        parse(&bridge.get_state_select(".last_stat").expect("select")),
        json!({"path": "out.txt", "overwrite_all": true})
    );

    bridge.write_hack("out.txt", false).expect("write_hack");
    assert_eq!(
        bridge.get_state_select(".last_stat.overwrite_all").expect("select"),
        "false"
    );
}

#[test]
fn write_rom_without_rom_reports_guest_errors() {
    let mut bridge = ready();
    assert!(bridge.write_rom("out.nes").is_err());
    assert_eq!(bridge.take_error(), "no ROM loaded");
    assert!(bridge.write_hack("out.txt", false).is_err());
    assert_eq!(bridge.take_error(), "no ROM loaded");
}

#[test]
fn write_rom_after_load_succeeds() {
    let mut bridge = loaded();
    assert!(bridge.write_rom("out.nes").is_ok());
    assert!(!bridge.error_occurred());
}

#[test]
fn non_rom_path_is_rejected_by_guest() {
    let mut bridge = ready();
    assert!(bridge.load_rom("notes.txt").is_err());
    assert_eq!(bridge.take_error(), "not an NES ROM: notes.txt");
    assert_eq!(bridge.take_error(), "");
}

#[test]
fn hack_errors_come_from_errors_string() {
    let mut bridge = loaded();
    let err = bridge.load_hack("bad_hack.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuestDomain);
    assert_eq!(
        bridge.take_error(),
        "line 3: unknown directive 'wrold'\nline 7: tile index out of range"
    );
}

#[test]
fn silent_failure_is_unknown_error() {
    let mut bridge = loaded();
    assert_eq!(
        bridge.load_hack("silent.txt").unwrap_err(),
        BridgeError::Unknown
    );
    assert_eq!(bridge.take_error(), "unknown error");
}

#[test]
fn mirror_tile_lookup() {
    let mut bridge = loaded();
    assert_eq!(bridge.mirror_tile_idx(0, 5).expect("mirror"), 6);
    assert_eq!(bridge.mirror_tile_idx(7, 1).expect("mirror"), 0);
    assert_eq!(bridge.mirror_tile_idx(3, 42).expect("mirror"), 42);
}

#[test]
fn missing_world_scenario() {
    let mut bridge = loaded();
    assert!(bridge.mirror_tile_idx(99, 5).is_err());
    assert!(bridge.take_error().contains("No such world exists"));

    assert!(bridge.mirror_tile_idx(8, 5).is_err());
    assert!(bridge.mirror_tile_idx(-1, 5).is_err());
    assert_eq!(bridge.take_error(), "No such world exists");
}

#[test]
fn worlds_are_empty_before_rom() {
    let mut bridge = ready();
    assert_eq!(
        bridge.mirror_tile_idx(0, 0).unwrap_err(),
        BridgeError::NoSuchWorld
    );
}

#[test]
fn negative_tile_is_rejected() {
    let mut bridge = loaded();
    assert_eq!(
        bridge.mirror_tile_idx(0, -4).unwrap_err(),
        BridgeError::NegativeTile
    );
    assert_eq!(bridge.take_error(), "negative medtile idx forbidden.");
}

#[test]
fn negative_guest_result_is_invalid() {
    let mut bridge = loaded();
    assert_eq!(
        bridge.mirror_tile_idx(0, 300).unwrap_err(),
        BridgeError::InvalidMirrorTile
    );
}

#[test]
fn guest_exception_is_trapped_and_cleared() {
    let mut bridge = loaded();
    let err = bridge.mirror_tile_idx(2, 13).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuestException);

    let message = bridge.take_error();
    assert!(message.starts_with("A guest exception occurred.\n"));
    assert!(message.contains("RangeError: medtile 13 has no mirror in world 2"));

    // Nothing was left pending for the next call.
    assert_eq!(bridge.mirror_tile_idx(2, 5).expect("mirror"), 6);
    assert!(!bridge.error_occurred());
}

#[test]
fn exception_without_formatter() {
    let settings = Settings {
        runtime: RuntimeSettings {
            decode_exceptions: false,
            ..RuntimeSettings::default()
        },
        ..Settings::default()
    };
    let mut bridge: Bridge<QuickJsSession> = Bridge::with_settings(settings);
    bridge.init(fixture("mmagedit.js")).expect("init");
    assert!(!bridge.session().expect("session").decodes_exceptions());

    assert!(bridge.load_rom("explode.nes").is_err());
    assert_eq!(
        bridge.take_error(),
        "A guest exception occurred. (unable to decode exception details)"
    );
    assert!(bridge.load_rom("base.nes").is_ok());
}

#[test]
fn stale_exception_triggers_precheck() {
    let mut bridge = loaded();
    bridge.session().expect("session").context().with(|ctx| {
        let _ = ctx.eval::<(), _>("throw new Error('left behind')");
    });

    let err = bridge.write_rom("out.nes").unwrap_err();
    assert!(matches!(err, BridgeError::StaleException(_)));
    let message = bridge.take_error();
    assert!(message.contains("before entering the bridge function"));
    assert!(message.contains("Error: left behind"));

    assert!(bridge.write_rom("out.nes").is_ok());
}

#[test]
fn calls_before_init_are_invariant_errors() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    let err = bridge.get_state().unwrap_err();
    assert_eq!(err, BridgeError::NotInitialized);
    assert!(bridge.take_error().contains("internal library error"));
    assert!(bridge.end().is_ok());
}

#[test]
fn old_format_is_rejected() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    let err = bridge.init(fixture("old_format.js")).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::FormatTooOld {
            installed: 202001010000,
            ..
        }
    ));
    assert!(bridge.session().is_none());
    assert!(bridge.end().is_ok());
}

#[test]
fn missing_class_is_rejected() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    assert!(bridge.init(fixture("missing_mmdata.js")).is_err());
    assert_eq!(bridge.take_error(), "unable to access class src.mmdata.MMData");
}

#[test]
fn missing_module_is_rejected() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    let err = bridge.init(fixture("missing_util.js")).unwrap_err();
    assert_eq!(err, BridgeError::MissingSymbol(GuestSymbol::Util));
    assert_eq!(
        bridge.take_error(),
        "unable to access src.constants or src.util modules"
    );
    assert!(bridge.end().is_ok());
}

#[test]
fn uncallable_guest_methods_name_the_call() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    bridge.init(fixture("partial_mmdata.js")).expect("init");
    assert!(bridge.load_rom("base.nes").is_ok());

    let err = bridge.write_rom("out.nes").unwrap_err();
    assert_eq!(err, BridgeError::Invoke("mmdata.write".to_string()));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(bridge.take_error(), "failure to invoke mmdata.write()");

    let err = bridge.mirror_tile_idx(0, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(bridge.take_error(), "failure to invoke world.mirror_tile()");

    // Nothing was thrown, so nothing lingers.
    assert!(bridge.load_rom("base.nes").is_ok());
    assert!(!bridge.error_occurred());
}

#[test]
fn load_failure_reports_exception() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    let err = bridge.init(fixture("throws_on_load.js")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuestException);
    assert!(bridge
        .take_error()
        .contains("TypeError: tables.json is corrupt"));
    assert!(bridge.end().is_ok());
}

#[test]
fn unreadable_script_fails_startup() {
    let mut bridge: Bridge<QuickJsSession> = Bridge::new();
    let err = bridge.init(fixture("does_not_exist.js")).unwrap_err();
    assert!(matches!(err, BridgeError::Startup(_)));
    assert!(bridge.take_error().contains("unable to read guest script"));
}

#[test]
fn reinit_after_end() {
    let mut bridge = loaded();
    assert!(bridge.end().is_ok());
    assert!(bridge.load_rom("base.nes").is_err());

    bridge.init(fixture("mmagedit.js")).expect("init again");
    assert!(bridge.load_rom("base.nes").is_ok());
}
