//! Exception bridge: trap, format and clear guest exceptions
//!
//! QuickJS keeps a thrown value as the runtime's current exception until it
//! is fetched with `Ctx::catch`. Fetching is what clears it, so every path
//! here that sees an exception also catches it.

use mmbridge_core::{GuestException, GuestFault, GuestResult};
use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Function, Object, Persistent, Type, Value};

const TRACEBACK_SOURCE: &str = include_str!("traceback.js");

/// Turns guest exceptions into [`GuestException`]s.
///
/// Holds the diagnostic formatter when it could be imported. Without it,
/// exceptions are still trapped and cleared, just not described.
#[derive(Clone, Default)]
pub(crate) struct ExceptionBridge {
    formatter: Option<Persistent<Function<'static>>>,
}

impl ExceptionBridge {
    /// A bridge that never decodes exception details.
    pub fn undecoded() -> Self {
        Self::default()
    }

    /// Evaluates the bundled `traceback.js` module and keeps its `format_exc`.
    pub fn import(ctx: &Ctx<'_>) -> Self {
        let formatter = ctx
            .eval::<Object, _>(TRACEBACK_SOURCE)
            .and_then(|module| module.get::<_, Function>("format_exc"));
        match formatter {
            Ok(format_exc) => Self {
                formatter: Some(Persistent::save(ctx, format_exc)),
            },
            Err(err) => {
                let _ = ctx.catch();
                tracing::warn!("traceback module unavailable, exceptions will not be decoded: {err}");
                Self::undecoded()
            }
        }
    }

    pub fn decodes(&self) -> bool {
        self.formatter.is_some()
    }

    /// Maps a failed QuickJS operation onto a guest fault, clearing the
    /// exception if one was thrown. Anything else was a host-side conversion.
    pub fn trap<'js, T>(&self, ctx: &Ctx<'js>, result: rquickjs::Result<T>) -> GuestResult<T> {
        result.map_err(|err| match err {
            rquickjs::Error::Exception => GuestFault::Exception(self.caught(ctx)),
            other => GuestFault::Marshal(other.to_string()),
        })
    }

    /// Like [`trap`](Self::trap) for a call into the guest function `target`.
    /// When the call could not be made at all, the fault names `target`.
    pub fn invoke<'js, T>(
        &self,
        ctx: &Ctx<'js>,
        target: &str,
        result: rquickjs::Result<T>,
    ) -> GuestResult<T> {
        result.map_err(|err| match err {
            rquickjs::Error::Exception => GuestFault::Exception(self.caught(ctx)),
            other => {
                tracing::debug!("cannot invoke {target}: {other}");
                GuestFault::Invoke(target.to_string())
            }
        })
    }

    fn caught<'js>(&self, ctx: &Ctx<'js>) -> GuestException {
        let exception = ctx.catch();
        self.describe(ctx, exception)
    }

    /// Takes the runtime's current exception, if one is pending.
    pub fn pending<'js>(&self, ctx: &Ctx<'js>) -> Option<GuestException> {
        let exception = ctx.catch();
        if matches!(
            exception.type_of(),
            Type::Uninitialized | Type::Undefined | Type::Null
        ) {
            return None;
        }
        Some(self.describe(ctx, exception))
    }

    fn describe<'js>(&self, ctx: &Ctx<'js>, exception: Value<'js>) -> GuestException {
        let Some(formatter) = &self.formatter else {
            return GuestException::undecoded();
        };
        let details = formatter
            .clone()
            .restore(ctx)
            .and_then(|format_exc| format_exc.call::<_, Coerced<String>>((exception,)));
        match details {
            Ok(Coerced(text)) => GuestException::decoded(text),
            Err(_) => {
                // The formatter itself threw; drop that one too.
                let _ = ctx.catch();
                GuestException::undecoded()
            }
        }
    }
}
