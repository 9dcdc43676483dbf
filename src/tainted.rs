use std::fmt;

/// An inbound payload that has not been sanitized and validated yet.
///
/// `Tainted<T>` marks request data as untrusted. It has no accessor: the
/// only ways out are [`SanitizationSpec::sanitize`], which keeps the value
/// tainted, and [`Pipeline::process`], which returns a
/// [`Verified`](crate::Verified) payload once validation passes.
///
/// [`SanitizationSpec::sanitize`]: crate::SanitizationSpec::sanitize
/// [`Pipeline::process`]: crate::Pipeline::process
///
/// # Examples
///
/// ```
/// use payload_policy::Tainted;
/// use serde_json::json;
///
/// let input = Tainted::new(json!({"title": "<script>x</script>"}));
/// assert!(format!("{input:?}").starts_with("Tainted"));
/// ```
///
/// ```compile_fail
/// use payload_policy::Tainted;
/// use serde_json::json;
///
/// let input = Tainted::new(json!({"title": "x"}));
/// let title = &input.inner["title"]; // private
/// ```
#[derive(Clone)]
pub struct Tainted<T> {
    // Must stay private; a public field would let raw input skip validation.
    inner: T,
}

impl<T> Tainted<T> {
    /// Wraps an untrusted value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Only the sanitizer and the pipeline may unwrap.
    pub(crate) fn into_inner(self) -> T {
        self.inner
    }
}

// No Deref, AsRef, Borrow or Into<T>: any of them would bypass validation.

impl<T: fmt::Debug> fmt::Debug for Tainted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tainted")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<T> From<T> for Tainted<T> {
    fn from(value: T) -> Self {
        Tainted::new(value)
    }
}
