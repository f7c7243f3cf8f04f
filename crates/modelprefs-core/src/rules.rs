//! Validation rules applied before preferences are written.
//!
//! An owner declares a [`RuleSet`] per key. [`validate`] checks a batch of
//! key/value pairs against those sets and aggregates every failure into one
//! [`ValidationErrors`] map, so a multi-key write reports all bad keys at
//! once. Keys without rules always pass.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signature of a user-supplied check. The error string may use `:attribute`
/// as a placeholder for the field name.
pub type CustomCheck = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// A named, user-supplied validation rule.
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    check: Arc<CustomCheck>,
}

impl CustomRule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        CustomRule {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule").field("name", &self.name).finish()
    }
}

/// A single validation rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Rejects null, empty strings and empty lists/objects. Stops further
    /// checks on the field when it fails.
    Required,
    /// Lets a null value pass every other rule.
    Nullable,
    /// `true`, `false`, `0`, `1`, `"0"` or `"1"`.
    Boolean,
    String,
    /// An integer or a string holding one.
    Integer,
    /// A number or a string holding one.
    Numeric,
    /// A JSON list or object.
    Array,
    /// The value's scalar form must equal one of these.
    In(Vec<Value>),
    /// The value's scalar form must equal none of these.
    NotIn(Vec<Value>),
    /// Lower bound on the value's size.
    Min(f64),
    /// Upper bound on the value's size.
    Max(f64),
    Custom(CustomRule),
}

impl Rule {
    /// Builds [`Rule::In`] from anything convertible to JSON values.
    pub fn in_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Rule::In(values.into_iter().map(Into::into).collect())
    }

    /// Builds [`Rule::NotIn`] from anything convertible to JSON values.
    pub fn not_in<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Rule::NotIn(values.into_iter().map(Into::into).collect())
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Rule::Custom(CustomRule::new(name, check))
    }
}

/// The ordered rules declared for one preference key.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Appends a rule.
    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn is_nullable(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Nullable))
    }

    fn is_numeric(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r, Rule::Numeric | Rule::Integer))
    }
}

impl From<Rule> for RuleSet {
    fn from(rule: Rule) -> Self {
        RuleSet { rules: vec![rule] }
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        RuleSet { rules }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        RuleSet {
            rules: iter.into_iter().collect(),
        }
    }
}

/// Field-level validation messages, in the order fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    messages: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Records a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of fields with at least one message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &IndexMap<String, Vec<String>> {
        &self.messages
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.messages.get(field).map(Vec::as_slice)
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.messages.contains_key(field)
    }
}

/// Validates `data` against the rule sets declared for its keys.
///
/// Every pair is checked; failures across all keys are aggregated.
pub fn validate<'v, I>(data: I, rules: &IndexMap<String, RuleSet>) -> Result<(), ValidationErrors>
where
    I: IntoIterator<Item = (&'v str, &'v Value)>,
{
    let mut errors = ValidationErrors::default();
    for (field, value) in data {
        if let Some(set) = rules.get(field) {
            check_field(field, value, set, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_field(field: &str, value: &Value, set: &RuleSet, errors: &mut ValidationErrors) {
    if value.is_null() && set.is_nullable() {
        return;
    }

    let attribute = field.replace('_', " ");
    let numeric = set.is_numeric();

    for rule in set.rules() {
        let message = match rule {
            Rule::Nullable => None,
            Rule::Required => {
                if is_empty(value) {
                    errors.add(field, format!("The {attribute} field is required."));
                    return;
                }
                None
            }
            Rule::Boolean => (!is_boolean(value))
                .then(|| format!("The {attribute} field must be true or false.")),
            Rule::String => {
                (!value.is_string()).then(|| format!("The {attribute} field must be a string."))
            }
            Rule::Integer => (!is_integer(value))
                .then(|| format!("The {attribute} field must be an integer.")),
            Rule::Numeric => {
                (!is_numeric(value)).then(|| format!("The {attribute} field must be a number."))
            }
            Rule::Array => (!(value.is_array() || value.is_object()))
                .then(|| format!("The {attribute} field must be an array.")),
            Rule::In(allowed) => (!matches_any(value, allowed))
                .then(|| format!("The selected {attribute} is invalid.")),
            Rule::NotIn(denied) => matches_any(value, denied)
                .then(|| format!("The selected {attribute} is invalid.")),
            Rule::Min(bound) => check_min(value, *bound, numeric, &attribute),
            Rule::Max(bound) => check_max(value, *bound, numeric, &attribute),
            Rule::Custom(custom) => (custom.check)(value)
                .err()
                .map(|message| message.replace(":attribute", &attribute)),
        };

        if let Some(message) = message {
            errors.add(field, message);
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => n.as_i64().is_some_and(|n| n == 0 || n == 1),
        Value::String(s) => s == "0" || s == "1",
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => parse_number(s).is_some(),
        _ => false,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// The scalar form used by `In`/`NotIn`; lists and objects have none.
fn scalar_form(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn matches_any(value: &Value, candidates: &[Value]) -> bool {
    let Some(form) = scalar_form(value) else {
        return false;
    };
    candidates
        .iter()
        .any(|candidate| scalar_form(candidate).as_deref() == Some(form.as_str()))
}

enum Size {
    Number(f64),
    Characters(f64),
    Items(f64),
}

fn size_of(value: &Value, numeric: bool) -> Option<Size> {
    match value {
        Value::Number(n) => n.as_f64().map(Size::Number),
        Value::String(s) => match (numeric, parse_number(s)) {
            (true, Some(n)) => Some(Size::Number(n)),
            _ => Some(Size::Characters(s.chars().count() as f64)),
        },
        Value::Array(items) => Some(Size::Items(items.len() as f64)),
        Value::Object(map) => Some(Size::Items(map.len() as f64)),
        Value::Null | Value::Bool(_) => None,
    }
}

fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    }
}

fn check_min(value: &Value, bound: f64, numeric: bool, attribute: &str) -> Option<String> {
    let n = format_bound(bound);
    match size_of(value, numeric) {
        Some(Size::Number(size)) if size >= bound => None,
        Some(Size::Characters(size)) if size >= bound => None,
        Some(Size::Items(size)) if size >= bound => None,
        Some(Size::Characters(_)) => Some(format!(
            "The {attribute} field must be at least {n} characters."
        )),
        Some(Size::Items(_)) => Some(format!("The {attribute} field must have at least {n} items.")),
        _ => Some(format!("The {attribute} field must be at least {n}.")),
    }
}

fn check_max(value: &Value, bound: f64, numeric: bool, attribute: &str) -> Option<String> {
    let n = format_bound(bound);
    match size_of(value, numeric) {
        Some(Size::Number(size)) if size <= bound => None,
        Some(Size::Characters(size)) if size <= bound => None,
        Some(Size::Items(size)) if size <= bound => None,
        Some(Size::Characters(_)) => Some(format!(
            "The {attribute} field must not be greater than {n} characters."
        )),
        Some(Size::Items(_)) => Some(format!(
            "The {attribute} field must not have more than {n} items."
        )),
        _ => Some(format!("The {attribute} field must not be greater than {n}.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_rules() -> IndexMap<String, RuleSet> {
        let mut rules = IndexMap::new();
        rules.insert("notifications".to_string(), RuleSet::from(Rule::Boolean));
        rules.insert(
            "theme".to_string(),
            RuleSet::from(Rule::in_values(["dark", "light", "system"])),
        );
        rules
    }

    #[test]
    fn keys_without_rules_pass() {
        let value = json!({"anything": [1, 2]});
        assert!(validate([("layout", &value)], &user_rules()).is_ok());
    }

    #[test]
    fn in_rule_rejects_unknown_choice() {
        let value = json!("invalid");
        let errors = validate([("theme", &value)], &user_rules()).unwrap_err();
        assert_eq!(errors.first("theme"), Some("The selected theme is invalid."));
    }

    #[test]
    fn batch_validation_aggregates_across_keys() {
        let theme = json!("neon");
        let notifications = json!("often");
        let errors = validate(
            [("theme", &theme), ("notifications", &notifications)],
            &user_rules(),
        )
        .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.first("notifications"),
            Some("The notifications field must be true or false.")
        );
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "theme": ["The selected theme is invalid."],
                "notifications": ["The notifications field must be true or false."],
            })
        );
    }

    #[test]
    fn boolean_accepts_numeric_flags() {
        let rules = user_rules();
        for value in [json!(true), json!(false), json!(0), json!(1), json!("0"), json!("1")] {
            assert!(validate([("notifications", &value)], &rules).is_ok(), "{value}");
        }
        assert!(validate([("notifications", &json!(2))], &rules).is_err());
        assert!(validate([("notifications", &Value::Null)], &rules).is_err());
    }

    #[test]
    fn nullable_short_circuits_null_values() {
        let mut rules = IndexMap::new();
        rules.insert(
            "timezone".to_string(),
            RuleSet::from(vec![Rule::Nullable, Rule::String, Rule::Max(64.0)]),
        );
        assert!(validate([("timezone", &Value::Null)], &rules).is_ok());
        assert!(validate([("timezone", &json!(5))], &rules).is_err());
    }

    #[test]
    fn required_stops_at_first_failure() {
        let mut rules = IndexMap::new();
        rules.insert(
            "display_name".to_string(),
            RuleSet::new().with(Rule::Required).with(Rule::String),
        );
        let errors = validate([("display_name", &json!(""))], &rules).unwrap_err();
        assert_eq!(
            errors.get("display_name"),
            Some(&["The display name field is required.".to_string()][..])
        );
    }

    #[test]
    fn size_bounds_follow_value_kind() {
        let mut rules = IndexMap::new();
        rules.insert(
            "max_members".to_string(),
            RuleSet::from(vec![Rule::Integer, Rule::Min(1.0), Rule::Max(100.0)]),
        );
        rules.insert("nickname".to_string(), RuleSet::from(Rule::Max(4.0)));
        rules.insert("tags".to_string(), RuleSet::from(Rule::Min(2.0)));

        assert!(validate([("max_members", &json!("50"))], &rules).is_ok());

        let members = json!(150);
        let nickname = json!("longname");
        let tags = json!(["one"]);
        let errors = validate(
            [
                ("max_members", &members),
                ("nickname", &nickname),
                ("tags", &tags),
            ],
            &rules,
        )
        .unwrap_err();

        assert_eq!(
            errors.first("max_members"),
            Some("The max members field must not be greater than 100.")
        );
        assert_eq!(
            errors.first("nickname"),
            Some("The nickname field must not be greater than 4 characters.")
        );
        assert_eq!(
            errors.first("tags"),
            Some("The tags field must have at least 2 items.")
        );
    }

    #[test]
    fn custom_rule_messages_substitute_attribute() {
        let mut rules = IndexMap::new();
        rules.insert(
            "accent_color".to_string(),
            RuleSet::from(Rule::custom("hex", |value| match value.as_str() {
                Some(s) if s.starts_with('#') && s.len() == 7 => Ok(()),
                _ => Err("The :attribute must be a hex color.".to_string()),
            })),
        );

        assert!(validate([("accent_color", &json!("#a0b1c2"))], &rules).is_ok());
        let errors = validate([("accent_color", &json!("red"))], &rules).unwrap_err();
        assert_eq!(
            errors.first("accent_color"),
            Some("The accent color must be a hex color.")
        );
    }

    #[test]
    fn not_in_compares_scalar_forms() {
        let mut rules = IndexMap::new();
        rules.insert("level".to_string(), RuleSet::from(Rule::not_in([1, 2])));
        assert!(validate([("level", &json!("1"))], &rules).is_err());
        assert!(validate([("level", &json!(3))], &rules).is_ok());
    }
}
