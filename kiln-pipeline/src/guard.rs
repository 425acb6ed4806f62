//! Failure boundary around plugin code.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use eyre::{Result, eyre};

/// Run plugin code, turning a panic into an error when `catch_panics` is set.
pub(crate) fn invoke(catch_panics: bool, f: impl FnOnce() -> Result<()>) -> Result<()> {
    if !catch_panics {
        return f();
    }

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(eyre!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_result_through() {
        assert!(invoke(true, || Ok(())).is_ok());
        let err = invoke(true, || Err(eyre!("boom"))).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_panic_becomes_error() {
        let err = invoke(true, || panic!("index out of range")).unwrap_err();
        assert_eq!(err.to_string(), "panicked: index out of range");

        let value = 7;
        let err = invoke(true, || panic!("bad value {value}")).unwrap_err();
        assert_eq!(err.to_string(), "panicked: bad value 7");
    }
}
