//! The mutable surface rules call into during one run.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, LazyLock};

use regex::Regex;

use scenecheck_types::{ObjectId, ScopeKind, Severity, SourceInfo, ValidationScope};

use super::issue::{AutoFix, Issue};
use crate::error::ValidationError;
use crate::host::{CallSiteResolver, HostState};

/// Placeholder identifier used when an unlabeled assertion cannot be named.
pub const UNRESOLVED_LABEL: &str = "Error";

static RICH_TEXT_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"</?b>|<color=[^>]*>|</color>").expect("static pattern")
});

/// Remove `<b>` and `<color=..>` markup.
pub fn strip_rich_text(text: &str) -> Cow<'_, str> {
    RICH_TEXT_TAGS.replace_all(text, "")
}

/// Which assertion produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionKind {
    Equal,
    NotEqual,
    NotNull,
    Null,
    True,
    False,
}

impl AssertionKind {
    /// Number of value arguments the assertion takes.
    pub fn arity(self) -> usize {
        match self {
            AssertionKind::Equal | AssertionKind::NotEqual => 2,
            _ => 1,
        }
    }

    /// Which argument names the checked expression.
    pub fn subject_argument(self) -> usize {
        match self {
            AssertionKind::Equal => 1,
            _ => 0,
        }
    }
}

/// Options for one assertion.
///
/// ```ignore
/// ctx.assert_not_null(door.key, Check::labeled("key").auto_fix(fix).warning());
/// ctx.assert_true(armed, "armed");
/// ```
pub struct Check<'a> {
    label: Option<Cow<'a, str>>,
    message: Option<Box<dyn FnOnce() -> String + 'a>>,
    auto_fix: Option<AutoFix>,
    severity: Severity,
}

impl Default for Check<'_> {
    fn default() -> Self {
        Self {
            label: None,
            message: None,
            auto_fix: None,
            severity: Severity::Error,
        }
    }
}

impl<'a> Check<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the checked expression in the default message.
    pub fn labeled(label: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Replace the default message. Only called if the check fails.
    pub fn message(mut self, message: impl FnOnce() -> String + 'a) -> Self {
        self.message = Some(Box::new(message));
        self
    }

    pub fn auto_fix(mut self, fix: impl FnOnce() -> anyhow::Result<()> + Send + 'static) -> Self {
        self.auto_fix = Some(Box::new(fix));
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn warning(self) -> Self {
        self.severity(Severity::Warning)
    }
}

impl<'a> From<&'a str> for Check<'a> {
    fn from(label: &'a str) -> Self {
        Check::labeled(label)
    }
}

impl From<String> for Check<'_> {
    fn from(label: String) -> Self {
        Check::labeled(label)
    }
}

impl fmt::Debug for Check<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("label", &self.label)
            .field("message", &self.message.is_some())
            .field("auto_fix", &self.auto_fix.is_some())
            .field("severity", &self.severity)
            .finish()
    }
}

/// Per-run context settings.
#[derive(Clone, Default)]
pub struct ContextOptions {
    /// Keep `<b>`/`<color>` markup in messages.
    pub rich_text: bool,
    /// Names unlabeled assertions from their call site.
    pub resolver: Option<Arc<dyn CallSiteResolver>>,
}

impl ContextOptions {
    pub fn rich_text(rich_text: bool) -> Self {
        Self {
            rich_text,
            resolver: None,
        }
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("rich_text", &self.rich_text)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Records failed checks against the current scope.
///
/// Every failing assertion appends exactly one [`Issue`], in evaluation
/// order; passing assertions record nothing.
pub struct ValidationContext {
    scope: ValidationScope,
    issues: Vec<Issue>,
    rich_text: bool,
    resolver: Option<Arc<dyn CallSiteResolver>>,
    labels: HashMap<SourceInfo, String>,
}

impl ValidationContext {
    /// Refused while the host is simulating.
    pub fn new<H: HostState + ?Sized>(host: &H, options: ContextOptions) -> Result<Self, ValidationError> {
        if host.is_simulating() {
            return Err(ValidationError::InvalidRunState);
        }
        Ok(Self {
            scope: ValidationScope::default(),
            issues: Vec::new(),
            rich_text: options.rich_text,
            resolver: options.resolver,
            labels: HashMap::new(),
        })
    }

    pub fn scope(&self) -> ValidationScope {
        self.scope
    }

    /// Attribute all following checks to `target`.
    pub fn set_scope(&mut self, kind: ScopeKind, target: Option<ObjectId>, is_dependency: bool) {
        self.scope = ValidationScope::new(kind, target, is_dependency);
    }

    pub fn is_asset(&self) -> bool {
        self.scope.is_asset()
    }

    pub fn is_scene_object(&self) -> bool {
        self.scope.is_scene_object()
    }

    pub fn rich_text(&self) -> bool {
        self.rich_text
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consume the context, releasing the label cache.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    #[track_caller]
    pub fn assert_equal<'a, T: PartialEq + Debug>(&mut self, expected: T, actual: T, check: impl Into<Check<'a>>) -> bool {
        let passed = actual == expected;
        self.record(
            passed,
            AssertionKind::Equal,
            || (format!("{expected:?}"), format!("{actual:?}")),
            check.into(),
        )
    }

    #[track_caller]
    pub fn assert_not_equal<'a, T: PartialEq + Debug>(
        &mut self,
        expected: T,
        actual: T,
        check: impl Into<Check<'a>>,
    ) -> bool {
        let passed = actual != expected;
        self.record(
            passed,
            AssertionKind::NotEqual,
            || (format!("not {expected:?}"), format!("{actual:?}")),
            check.into(),
        )
    }

    #[track_caller]
    pub fn assert_not_null<'a, T>(&mut self, value: Option<T>, check: impl Into<Check<'a>>) -> bool {
        let passed = value.is_some();
        self.record(
            passed,
            AssertionKind::NotNull,
            || ("not null".to_string(), "null".to_string()),
            check.into(),
        )
    }

    #[track_caller]
    pub fn assert_null<'a, T: Debug>(&mut self, value: Option<T>, check: impl Into<Check<'a>>) -> bool {
        let passed = value.is_none();
        self.record(
            passed,
            AssertionKind::Null,
            || ("null".to_string(), format!("{:?}", value.as_ref())),
            check.into(),
        )
    }

    #[track_caller]
    pub fn assert_true<'a>(&mut self, value: bool, check: impl Into<Check<'a>>) -> bool {
        self.record(
            value,
            AssertionKind::True,
            || ("true".to_string(), value.to_string()),
            check.into(),
        )
    }

    #[track_caller]
    pub fn assert_false<'a>(&mut self, value: bool, check: impl Into<Check<'a>>) -> bool {
        self.record(
            !value,
            AssertionKind::False,
            || ("false".to_string(), value.to_string()),
            check.into(),
        )
    }

    #[track_caller]
    fn record(
        &mut self,
        passed: bool,
        kind: AssertionKind,
        values: impl FnOnce() -> (String, String),
        check: Check<'_>,
    ) -> bool {
        if passed {
            return true;
        }
        let site = SourceInfo::caller();
        let Check {
            label,
            message,
            auto_fix,
            severity,
        } = check;

        let text = match message {
            Some(message) => message(),
            None => {
                let label = match label {
                    Some(label) => label.into_owned(),
                    None => self.resolve_label(&site, kind),
                };
                let (expected, actual) = values();
                format!(
                    "<b>{label}</b> is expected to be <b>{expected}</b>, but is <b><color={}>{actual}</color></b>",
                    severity.highlight_color()
                )
            }
        };
        let text = if self.rich_text {
            text
        } else {
            strip_rich_text(&text).into_owned()
        };

        let auto_fix = if self.scope.allows_auto_fix() {
            auto_fix
        } else {
            None
        };

        self.issues.push(Issue::new(self.scope, site, text, severity, auto_fix));
        false
    }

    fn resolve_label(&mut self, site: &SourceInfo, kind: AssertionKind) -> String {
        if let Some(label) = self.labels.get(site) {
            return label.clone();
        }
        let resolved = match &self.resolver {
            Some(resolver) => resolver.resolve(site, kind),
            None => Err(ValidationError::MalformedCallSite {
                site: site.clone(),
                reason: "assertion has no label and no call-site resolver is configured".to_string(),
            }),
        };
        let label = match resolved {
            Ok(label) => label,
            Err(e) => {
                tracing::warn!(%site, error = %e, "unlabeled assertion; using placeholder");
                UNRESOLVED_LABEL.to_string()
            }
        };
        self.labels.insert(site.clone(), label.clone());
        label
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("scope", &self.scope)
            .field("issues", &self.issues.len())
            .field("rich_text", &self.rich_text)
            .finish()
    }
}
