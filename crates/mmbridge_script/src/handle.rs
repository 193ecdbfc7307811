//! Handles to guest objects that outlive a single `Context::with` scope
//!
//! A handle owns a persistent reference plus a clone of the context, so the
//! runtime stays alive for as long as any handle does. Field order matters:
//! the reference is released before the context.

use mmbridge_core::{GuestFault, GuestResult};
use rquickjs::function::{IntoArgs, This};
use rquickjs::{Context, Ctx, FromJs, Function, Object, Persistent};

use crate::exception::ExceptionBridge;

#[derive(Clone)]
pub(crate) struct GuestHandle {
    object: Persistent<Object<'static>>,
    context: Context,
    exceptions: ExceptionBridge,
}

impl GuestHandle {
    pub fn save<'js>(
        ctx: &Ctx<'js>,
        object: Object<'js>,
        context: &Context,
        exceptions: &ExceptionBridge,
    ) -> Self {
        Self {
            object: Persistent::save(ctx, object),
            context: context.clone(),
            exceptions: exceptions.clone(),
        }
    }

    /// Another handle sharing this one's context and exception bridge.
    pub fn adopt<'js>(&self, ctx: &Ctx<'js>, object: Object<'js>) -> Self {
        Self::save(ctx, object, &self.context, &self.exceptions)
    }

    /// Runs `f` with the live object inside the context.
    pub fn enter<T>(
        &self,
        f: impl for<'js> FnOnce(&Ctx<'js>, Object<'js>, &ExceptionBridge) -> GuestResult<T>,
    ) -> GuestResult<T> {
        self.context.with(|ctx| {
            let object = self.exceptions.trap(&ctx, self.object.clone().restore(&ctx))?;
            f(&ctx, object, &self.exceptions)
        })
    }
}

/// Looks up `object[name]` and calls it. `args` must lead with
/// `This(object)` for a method call.
pub(crate) fn call_method<'js, A, R>(object: &Object<'js>, name: &str, args: A) -> rquickjs::Result<R>
where
    A: IntoArgs<'js>,
    R: FromJs<'js>,
{
    let method: Function<'js> = object.get(name)?;
    method.call(args)
}

pub(crate) fn this<'js>(object: &Object<'js>) -> This<Object<'js>> {
    This(object.clone())
}

/// Builds a guest string, clearing whatever the allocation failure left behind.
pub(crate) fn guest_string<'js>(ctx: &Ctx<'js>, text: &str) -> GuestResult<rquickjs::String<'js>> {
    rquickjs::String::from_str(ctx.clone(), text).map_err(|_| {
        let _ = ctx.catch();
        GuestFault::Marshal("unable to construct guest string".to_string())
    })
}
