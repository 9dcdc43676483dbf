/// A payload that went through sanitization and passed validation.
///
/// `Verified<T>` has no public constructor. Outside this crate the only
/// source of a `Verified<Value>` is [`Pipeline::process`], so holding one is
/// proof the schema accepted it. Transfer objects are built from
/// `Verified` payloads only; see
/// [`TransferObject::from_verified`](crate::TransferObject::from_verified).
///
/// [`Pipeline::process`]: crate::Pipeline::process
///
/// # Examples
///
/// ```compile_fail
/// use payload_policy::Verified;
/// use serde_json::json;
///
/// let forged = Verified::new_unchecked(json!({"admin": true}));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified<T> {
    inner: T,
}

impl<T> Verified<T> {
    /// Wraps a value without checking it. Callers must have validated it.
    pub(crate) fn new_unchecked(value: T) -> Self {
        Self { inner: value }
    }

    /// Consumes the wrapper.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> AsRef<T> for Verified<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}
