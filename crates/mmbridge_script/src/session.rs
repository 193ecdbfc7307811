//! Guest session on QuickJS
//!
//! Boot order follows the library-mode contract: fresh environments, the
//! argument vector, the diagnostic formatter, the script itself, then the
//! exported symbols and one `MMData` instance.

use std::path::Path;

use mmbridge_core::{
    DataModel, GuestException, GuestFault, GuestResult, GuestSession, GuestSymbol, Settings,
    TileIndex, World, LIB_MODE_FLAG,
};
use rquickjs::convert::Coerced;
use rquickjs::function::Constructor;
use rquickjs::{Context, Ctx, FromJs, Function, Object, Value};

use crate::error::ScriptError;
use crate::exception::ExceptionBridge;
use crate::handle::{call_method, guest_string, this, GuestHandle};
use crate::runtime::ScriptRuntime;

/// A QuickJS runtime with the guest library loaded.
///
/// Fields are declared in release order: handles first, runtime last.
pub struct QuickJsSession {
    data: QuickJsData,
    constants: GuestHandle,
    util: GuestHandle,
    locals: GuestHandle,
    globals: GuestHandle,
    exceptions: ExceptionBridge,
    runtime: ScriptRuntime,
}

// SAFETY: every persistent reference into the runtime is owned by the session
// (its handles, their clones and the exception bridge), so they all move
// between threads together. `QuickJsWorld` handles stay `!Send` and never
// outlive the call that produced them. Guest code only runs inside
// `Context::with`, which holds the runtime lock.
unsafe impl Send for QuickJsSession {}

struct Handles {
    data: GuestHandle,
    constants: GuestHandle,
    util: GuestHandle,
    locals: GuestHandle,
    globals: GuestHandle,
    exceptions: ExceptionBridge,
}

impl QuickJsSession {
    pub fn context(&self) -> &Context {
        &self.runtime.context
    }

    /// Whether exception messages carry a formatted trace.
    pub fn decodes_exceptions(&self) -> bool {
        self.exceptions.decodes()
    }

    fn load(
        runtime: &ScriptRuntime,
        script_path: &Path,
        source: String,
        decode_exceptions: bool,
    ) -> GuestResult<Handles> {
        let context = &runtime.context;
        context.with(|ctx| {
            let bare = ExceptionBridge::undecoded();

            // globals is the context's global object, locals is module.exports.
            let globals = ctx.globals();
            let locals = bare.trap(&ctx, Object::new(ctx.clone()))?;
            let module = bare.trap(&ctx, Object::new(ctx.clone()))?;
            bare.trap(&ctx, module.set("exports", locals.clone()))?;
            bare.trap(&ctx, globals.set("module", module.clone()))?;
            bare.trap(&ctx, globals.set("exports", locals))?;

            let script_args = vec![
                script_path.to_string_lossy().into_owned(),
                LIB_MODE_FLAG.to_string(),
            ];
            bare.trap(&ctx, globals.set("scriptArgs", script_args))?;

            let exceptions = if decode_exceptions {
                ExceptionBridge::import(&ctx)
            } else {
                bare
            };
            tracing::debug!(decoding = exceptions.decodes(), "executing guest script");

            exceptions.trap(&ctx, ctx.eval::<(), _>(source))?;

            // The script may have replaced module.exports wholesale.
            let locals: Object = exceptions.trap(&ctx, module.get("exports"))?;
            let constants: Object = symbol(&ctx, &exceptions, &locals, GuestSymbol::Constants)?;
            let util: Object = symbol(&ctx, &exceptions, &locals, GuestSymbol::Util)?;
            let mmdata: Constructor = symbol(&ctx, &exceptions, &locals, GuestSymbol::MMData)?;

            let data: Object = exceptions.invoke(&ctx, "mmdata.MMData", mmdata.construct(()))?;

            Ok(Handles {
                data: GuestHandle::save(&ctx, data, context, &exceptions),
                constants: GuestHandle::save(&ctx, constants, context, &exceptions),
                util: GuestHandle::save(&ctx, util, context, &exceptions),
                locals: GuestHandle::save(&ctx, locals, context, &exceptions),
                globals: GuestHandle::save(&ctx, globals, context, &exceptions),
                exceptions,
            })
        })
    }
}

impl GuestSession for QuickJsSession {
    type Data = QuickJsData;

    fn start(script_path: &Path, settings: &Settings) -> GuestResult<Self> {
        let runtime = ScriptRuntime::new(&settings.runtime).map_err(startup)?;
        let source = std::fs::read_to_string(script_path).map_err(|source| {
            startup(ScriptError::Read {
                path: script_path.to_path_buf(),
                source,
            })
        })?;

        let handles = Self::load(
            &runtime,
            script_path,
            source,
            settings.runtime.decode_exceptions,
        )?;

        Ok(Self {
            data: QuickJsData {
                handle: handles.data,
            },
            constants: handles.constants,
            util: handles.util,
            locals: handles.locals,
            globals: handles.globals,
            exceptions: handles.exceptions,
            runtime,
        })
    }

    fn pending_exception(&self) -> Option<GuestException> {
        self.runtime
            .context
            .with(|ctx| self.exceptions.pending(&ctx))
    }

    fn version_and_date(&self) -> GuestResult<String> {
        self.constants.enter(|ctx, constants, exceptions| {
            let target = "constants.get_version_and_date";
            let get_version_and_date: Function =
                exceptions.invoke(ctx, target, constants.get("get_version_and_date"))?;
            let Coerced(text) = exceptions.invoke(
                ctx,
                target,
                get_version_and_date.call::<_, Coerced<String>>(()),
            )?;
            Ok(text)
        })
    }

    fn format_version(&self) -> GuestResult<u64> {
        self.constants.enter(|ctx, constants, exceptions| {
            let mmfmt: Value = exceptions.trap(ctx, constants.get("mmfmt"))?;
            integral(&mmfmt)
                .and_then(|version| u64::try_from(version).ok())
                .ok_or_else(|| {
                    GuestFault::Marshal("constants.mmfmt is not a non-negative integer".to_string())
                })
        })
    }

    fn data(&self) -> &QuickJsData {
        &self.data
    }

    fn shutdown(self) {
        let Self {
            data,
            constants,
            util,
            locals,
            globals,
            exceptions,
            runtime,
        } = self;
        drop(data);
        drop((constants, util));
        drop((locals, globals));
        drop(exceptions);
        runtime.shutdown();
    }
}

/// The guest `MMData` instance.
pub struct QuickJsData {
    handle: GuestHandle,
}

impl QuickJsData {
    fn call_with_str(&self, method: &'static str, text: &str) -> GuestResult<bool> {
        self.handle.enter(|ctx, data, exceptions| {
            let text = guest_string(ctx, text)?;
            let result: Value = exceptions.invoke(
                ctx,
                &format!("mmdata.{method}"),
                call_method(&data, method, (this(&data), text)),
            )?;
            exceptions.trap(ctx, truthy(&result))
        })
    }
}

impl DataModel for QuickJsData {
    type World = QuickJsWorld;

    fn read(&self, path: &str) -> GuestResult<bool> {
        self.call_with_str("read", path)
    }

    fn parse(&self, path: &str) -> GuestResult<bool> {
        self.call_with_str("parse", path)
    }

    fn write(&self, path: &str) -> GuestResult<bool> {
        self.call_with_str("write", path)
    }

    fn stat(&self, path: &str, overwrite_all: bool) -> GuestResult<bool> {
        self.handle.enter(|ctx, data, exceptions| {
            let path = guest_string(ctx, path)?;
            let result: Value = exceptions.invoke(
                ctx,
                "mmdata.stat",
                call_method(&data, "stat", (this(&data), path, overwrite_all)),
            )?;
            exceptions.trap(ctx, truthy(&result))
        })
    }

    fn serialize_json_str(&self, selector: &str) -> GuestResult<String> {
        self.handle.enter(|ctx, data, exceptions| {
            let selector = guest_string(ctx, selector)?;
            let result: Value = exceptions.invoke(
                ctx,
                "mmdata.serialize_json_str",
                call_method(&data, "serialize_json_str", (this(&data), selector)),
            )?;
            let Coerced(json) = exceptions.trap(ctx, result.get::<Coerced<String>>())?;
            Ok(json)
        })
    }

    fn deserialize_json_str(&self, json: &str) -> GuestResult<bool> {
        self.call_with_str("deserialize_json_str", json)
    }

    fn errors_string(&self) -> GuestResult<Option<String>> {
        self.handle.enter(|ctx, data, exceptions| {
            let result: Value = exceptions.invoke(
                ctx,
                "mmdata.errors_string",
                call_method(&data, "errors_string", (this(&data),)),
            )?;
            if result.is_undefined() || result.is_null() {
                return Ok(None);
            }
            let Coerced(text) = exceptions.trap(ctx, result.get::<Coerced<String>>())?;
            Ok(Some(text).filter(|text| !text.is_empty()))
        })
    }

    fn world_count(&self) -> GuestResult<usize> {
        self.handle.enter(|ctx, data, exceptions| {
            let worlds: Value = exceptions.trap(ctx, data.get("worlds"))?;
            Ok(worlds.as_array().map_or(0, |worlds| worlds.len()))
        })
    }

    fn world(&self, idx: usize) -> GuestResult<Option<QuickJsWorld>> {
        self.handle.enter(|ctx, data, exceptions| {
            let worlds: Value = exceptions.trap(ctx, data.get("worlds"))?;
            let Some(worlds) = worlds.as_array() else {
                return Ok(None);
            };
            if idx >= worlds.len() {
                return Ok(None);
            }
            let world: Value = exceptions.trap(ctx, worlds.get(idx))?;
            Ok(world.as_object().map(|world| QuickJsWorld {
                handle: self.handle.adopt(ctx, world.clone()),
            }))
        })
    }
}

/// One element of `MMData.worlds`.
pub struct QuickJsWorld {
    handle: GuestHandle,
}

impl World for QuickJsWorld {
    fn mirror_tile(&self, tile: TileIndex) -> GuestResult<i64> {
        self.handle.enter(|ctx, world, exceptions| {
            let result: Value = exceptions.invoke(
                ctx,
                "world.mirror_tile",
                call_method(&world, "mirror_tile", (this(&world), tile)),
            )?;
            // Anything that is not an integer reads as the failure sentinel.
            Ok(integral(&result).unwrap_or(-1))
        })
    }
}

/// Fetches a required export. Absent or mistyped exports are missing.
fn symbol<'js, T: FromJs<'js>>(
    ctx: &Ctx<'js>,
    exceptions: &ExceptionBridge,
    locals: &Object<'js>,
    export: GuestSymbol,
) -> GuestResult<T> {
    let value: Value = exceptions.trap(ctx, locals.get(export.name()))?;
    if value.is_undefined() || value.is_null() {
        return Err(GuestFault::MissingSymbol(export));
    }
    match T::from_js(ctx, value) {
        Err(err @ rquickjs::Error::Exception) => exceptions.trap(ctx, Err(err)),
        result => result.map_err(|_| GuestFault::MissingSymbol(export)),
    }
}

fn truthy(value: &Value<'_>) -> rquickjs::Result<bool> {
    value.get::<Coerced<bool>>().map(|Coerced(truth)| truth)
}

fn integral(value: &Value<'_>) -> Option<i64> {
    if let Some(int) = value.as_int() {
        return Some(i64::from(int));
    }
    value
        .as_float()
        .filter(|float| float.is_finite() && float.fract() == 0.0)
        .map(|float| float as i64)
}

fn startup(err: ScriptError) -> GuestFault {
    GuestFault::Runtime(err.to_string())
}
