//! The rule catalog.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use super::{CopyOptions, EnableWhenOptions};
use crate::lifecycle::Disposer;
use crate::node::{Control, FormNode, GroupNode, SetValueOptions, WeakGroupNode};
use crate::reactive::{untracked, Effect};

/// Handed to a behavior schema. Every rule returns its own disposer and is
/// also collected here, so the whole schema can be undone at once.
pub struct BehaviorContext {
    form: GroupNode,
    disposers: Vec<Disposer>,
}

impl BehaviorContext {
    pub(crate) fn new(form: GroupNode) -> Self {
        Self {
            form,
            disposers: Vec::new(),
        }
    }

    /// The group the schema is applied to. Paths are relative to it.
    pub fn form(&self) -> &GroupNode {
        &self.form
    }

    /// Node at `path`, if it resolves.
    pub fn node(&self, path: &str) -> Option<FormNode> {
        self.form.get_field_by_path(path)
    }

    /// Number of rules declared so far.
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    pub(crate) fn into_disposer(self) -> Disposer {
        Disposer::combine(self.disposers)
    }

    fn keep(&mut self, disposer: Disposer) -> Disposer {
        self.disposers.push(disposer.clone());
        disposer
    }

    fn resolve(&self, path: &str, rule: &'static str) -> Option<FormNode> {
        let node = self.node(path);
        if node.is_none() {
            tracing::warn!(path, rule, "behavior target does not resolve");
        }
        node
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Keep the leaf at `target` equal to `compute` over the `sources`
    /// values, in order. Runs immediately.
    pub fn compute_from<F>(&mut self, sources: &[&str], target: &str, compute: F) -> Disposer
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let Some(field) = self.form.field_at(target) else {
            tracing::warn!(path = target, rule = "compute_from", "target is not a field");
            return Disposer::noop();
        };
        let Some(sources) = self.resolve_all(sources, "compute_from") else {
            return Disposer::noop();
        };
        let disposer = field.compute_from(&sources, compute);
        self.keep(disposer)
    }

    /// Copy `source` into `target` on every change of `source`.
    pub fn copy_from(&mut self, source: &str, target: &str, options: CopyOptions) -> Disposer {
        let (Some(source), Some(target)) = (
            self.resolve(source, "copy_from"),
            self.resolve(target, "copy_from"),
        ) else {
            return Disposer::noop();
        };
        let form = self.form.downgrade();

        let effect = observe(source, false, move |value| {
            if let Some(when) = &options.when {
                let Some(form) = form.upgrade() else { return };
                if !when(&form.get_value()) {
                    return;
                }
            }
            let next = match &options.transform {
                Some(transform) => transform(value),
                None => value.clone(),
            };
            write_programmatic(&target, next);
        });
        self.keep(effect.disposer())
    }

    /// One-way link: `target` always holds `transform(source)`. Runs
    /// immediately.
    pub fn link_fields<F>(&mut self, source: &str, target: &str, transform: F) -> Disposer
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let (Some(source), Some(target)) = (
            self.resolve(source, "link_fields"),
            self.resolve(target, "link_fields"),
        ) else {
            return Disposer::noop();
        };
        let effect = observe(source, true, move |value| {
            write_programmatic(&target, transform(value));
        });
        self.keep(effect.disposer())
    }

    /// Two-way link. `b` takes `a`'s value first; afterwards a change on
    /// either side is written to the other.
    pub fn sync_fields(&mut self, a: &str, b: &str) -> Disposer {
        let (Some(a), Some(b)) = (self.resolve(a, "sync_fields"), self.resolve(b, "sync_fields"))
        else {
            return Disposer::noop();
        };
        write_programmatic(&b, a.get_value());

        let forward = {
            let b = b.clone();
            observe(a.clone(), false, move |value| write_programmatic(&b, value.clone()))
        };
        let backward = observe(b, false, move |value| write_programmatic(&a, value.clone()));
        self.keep(Disposer::combine([forward.disposer(), backward.disposer()]))
    }

    /// Rewrite `target` through `transform` whenever it changes, e.g. to
    /// normalize input. The rewrite itself does not re-trigger the rule.
    pub fn transform_value<F>(&mut self, target: &str, transform: F) -> Disposer
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let Some(node) = self.resolve(target, "transform_value") else {
            return Disposer::noop();
        };
        let writer = node.clone();
        let effect = observe(node, true, move |value| {
            let next = transform(value);
            if &next != value {
                write_programmatic(&writer, next);
            }
        });
        self.keep(effect.disposer())
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Enable `target` while `predicate` holds for the form value, disable
    /// it otherwise.
    pub fn enable_when<P>(&mut self, target: &str, predicate: P, options: EnableWhenOptions) -> Disposer
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let Some(node) = self.resolve(target, "enable_when") else {
            return Disposer::noop();
        };
        let effect = on_form_value(self.form.downgrade(), move |value| {
            let enabled = predicate(value);
            untracked(|| {
                if enabled && node.disabled() {
                    node.enable();
                } else if !enabled && !node.disabled() {
                    node.disable();
                    if options.reset_on_disable {
                        node.reset_to_initial();
                    }
                }
            });
        });
        self.keep(effect.disposer())
    }

    /// Inverse of [`enable_when`](Self::enable_when).
    pub fn disable_when<P>(&mut self, target: &str, predicate: P, options: EnableWhenOptions) -> Disposer
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.enable_when(target, move |value| !predicate(value), options)
    }

    /// Show `target` while `predicate` holds for the form value.
    pub fn show_when<P>(&mut self, target: &str, predicate: P) -> Disposer
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let Some(node) = self.resolve(target, "show_when") else {
            return Disposer::noop();
        };
        let effect = on_form_value(self.form.downgrade(), move |value| {
            let visible = predicate(value);
            untracked(|| if visible { node.show() } else { node.hide() });
        });
        self.keep(effect.disposer())
    }

    /// Reset `target` each time `predicate` on the form value turns true.
    ///
    /// Holding true does not reset again; it has to turn false first.
    pub fn reset_when<P>(&mut self, target: &str, predicate: P) -> Disposer
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let Some(node) = self.resolve(target, "reset_when") else {
            return Disposer::noop();
        };
        let last: Mutex<Option<bool>> = Mutex::new(None);
        let effect = on_form_value(self.form.downgrade(), move |value| {
            let now = predicate(value);
            let before = last.lock().replace(now);
            if now && before == Some(false) {
                untracked(|| node.reset_to_initial());
            }
        });
        self.keep(effect.disposer())
    }

    /// Re-run `target`'s validation whenever any of `sources` changes.
    pub fn revalidate_when(&mut self, target: &str, sources: &[&str]) -> Disposer {
        let Some(node) = self.resolve(target, "revalidate_when") else {
            return Disposer::noop();
        };
        let Some(sources) = self.resolve_all(sources, "revalidate_when") else {
            return Disposer::noop();
        };
        let first = AtomicBool::new(true);
        let effect = Effect::new(move || {
            for source in &sources {
                source.value();
            }
            if !first.swap(false, Ordering::SeqCst) {
                untracked(|| node.revalidate());
            }
        });
        self.keep(effect.disposer())
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Call `callback` with the value at `path` on every change, and once
    /// right away when `immediate` is set.
    pub fn watch_field<F>(&mut self, path: &str, callback: F, immediate: bool) -> Disposer
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let Some(node) = self.resolve(path, "watch_field") else {
            return Disposer::noop();
        };
        let effect = observe(node, immediate, callback);
        self.keep(effect.disposer())
    }

    /// Watch one field across every item of the list at `array_path`.
    pub fn watch_items<F>(&mut self, array_path: &str, field_key: &str, callback: F) -> Disposer
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let Some(array) = self.form.array_at(array_path) else {
            tracing::warn!(path = array_path, rule = "watch_items", "target is not a list");
            return Disposer::noop();
        };
        let disposer = array.watch_items(field_key, callback);
        self.keep(disposer)
    }

    /// Apply an item behavior schema to the list at `array_path`.
    pub fn items<F>(&mut self, array_path: &str, schema: F) -> Disposer
    where
        F: Fn(&mut BehaviorContext) + Send + Sync + 'static,
    {
        let Some(array) = self.form.array_at(array_path) else {
            tracing::warn!(path = array_path, rule = "items", "target is not a list");
            return Disposer::noop();
        };
        let disposer = array.apply_behavior_schema(schema);
        self.keep(disposer)
    }

    /// Free-form effect over the form. Runs immediately and again whenever
    /// anything it read changes.
    pub fn effect<F>(&mut self, run: F) -> Disposer
    where
        F: Fn(&GroupNode) + Send + Sync + 'static,
    {
        let form = self.form.downgrade();
        let effect = Effect::new(move || {
            if let Some(form) = form.upgrade() {
                run(&form);
            }
        });
        self.keep(effect.disposer())
    }

    fn resolve_all(&self, paths: &[&str], rule: &'static str) -> Option<Vec<FormNode>> {
        paths
            .iter()
            .map(|path| self.resolve(path, rule))
            .collect()
    }
}

impl std::fmt::Debug for BehaviorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorContext")
            .field("form", &self.form)
            .field("rules", &self.disposers.len())
            .finish()
    }
}

/// Effect calling `callback` with `node`'s value, skipping the first run
/// unless `immediate`.
fn observe<F>(node: FormNode, immediate: bool, callback: F) -> Effect
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    let first = AtomicBool::new(true);
    Effect::new(move || {
        let value = node.value();
        let initial = first.swap(false, Ordering::SeqCst);
        if initial && !immediate {
            return;
        }
        untracked(|| callback(&value));
    })
}

/// Effect calling `callback` with the whole form value, immediately and on
/// every change.
fn on_form_value<F>(form: WeakGroupNode, callback: F) -> Effect
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Effect::new(move || {
        if let Some(form) = form.upgrade() {
            let value = form.value();
            callback(&value);
        }
    })
}

/// Write without marking the target dirty.
fn write_programmatic(node: &FormNode, value: Value) {
    match node {
        FormNode::Field(field) => field.set_value_with(value, SetValueOptions::programmatic()),
        other => other.set_value(value),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ArraySchema, FieldConfig, GroupSchema};
    use crate::validation::ValidationError;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;
    use std::sync::Arc;

    fn order() -> GroupNode {
        GroupNode::new(
            GroupSchema::new()
                .field("kind", FieldConfig::new("person"))
                .field("company", FieldConfig::new("Acme"))
                .field("price", FieldConfig::new(0))
                .field("quantity", FieldConfig::new(1))
                .field("total", FieldConfig::new(0))
                .field("billing", FieldConfig::new(""))
                .field("shipping", FieldConfig::new(""))
                .field("code", FieldConfig::new(""))
                .field(
                    "lines",
                    ArraySchema::new(
                        GroupSchema::new()
                            .field("qty", FieldConfig::new(1))
                            .field("note", FieldConfig::new("")),
                    )
                    .with_items([json!({"qty": 2})]),
                ),
        )
    }

    fn product(values: &[Value]) -> Value {
        json!(values[0].as_i64().unwrap_or(0) * values[1].as_i64().unwrap_or(0))
    }

    #[test]
    fn compute_from_recomputes_on_source_change() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.compute_from(&["price", "quantity"], "total", product);
        });

        form.get_field("price").unwrap().set_value(json!(100));
        form.get_field("quantity").unwrap().set_value(json!(3));
        assert_eq!(form.get_value()["total"], json!(300));

        form.get_field("quantity").unwrap().set_value(json!(0));
        assert_eq!(form.get_value()["total"], json!(0));
    }

    #[test]
    fn enable_when_disables_and_resets() {
        let form = order();
        let company = form.field_at("company").unwrap();
        company.add_validator(|v| {
            (v == &json!("")).then(|| ValidationError::new("required", "Required"))
        });
        let _rules = form.apply_behavior_schema(|b| {
            b.enable_when(
                "company",
                |form| form["kind"] == json!("business"),
                EnableWhenOptions::resetting(),
            );
        });
        assert!(company.disabled());
        assert!(form.get_value().get("company").is_none());

        form.get_field("kind").unwrap().set_value(json!("business"));
        assert!(company.enabled());
        company.set_value(json!("Other"));

        form.get_field("kind").unwrap().set_value(json!("person"));
        assert!(company.disabled());
        assert_eq!(company.get_value(), json!("Acme"));

        form.get_field("kind").unwrap().set_value(json!("business"));
        company.set_value(json!(""));
        assert!(company.invalid());
    }

    #[test]
    fn copy_from_honors_condition_and_transform() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.copy_from(
                "billing",
                "shipping",
                CopyOptions::new()
                    .when(|form| form["kind"] == json!("person"))
                    .transform(|v| json!(v.as_str().unwrap_or("").to_uppercase())),
            );
        });

        form.get_field("billing").unwrap().set_value(json!("main st"));
        assert_eq!(form.get_value()["shipping"], json!("MAIN ST"));
        assert!(!form.field_at("shipping").unwrap().dirty());

        form.get_field("kind").unwrap().set_value(json!("business"));
        form.get_field("billing").unwrap().set_value(json!("side st"));
        assert_eq!(form.get_value()["shipping"], json!("MAIN ST"));
    }

    #[test]
    fn sync_fields_is_two_way() {
        let form = order();
        form.get_field("billing").unwrap().set_value(json!("a"));
        let _rules = form.apply_behavior_schema(|b| {
            b.sync_fields("billing", "shipping");
        });
        assert_eq!(form.get_value()["shipping"], json!("a"));

        form.get_field("shipping").unwrap().set_value(json!("b"));
        assert_eq!(form.get_value()["billing"], json!("b"));
        form.get_field("billing").unwrap().set_value(json!("c"));
        assert_eq!(form.get_value()["shipping"], json!("c"));
    }

    #[test]
    fn link_fields_applies_immediately() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.link_fields("quantity", "total", |v| json!(v.as_i64().unwrap_or(0) * 10));
        });
        assert_eq!(form.get_value()["total"], json!(10));
        form.get_field("quantity").unwrap().set_value(json!(4));
        assert_eq!(form.get_value()["total"], json!(40));
    }

    #[test]
    fn transform_value_normalizes_input() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.transform_value("code", |v| json!(v.as_str().unwrap_or("").trim().to_uppercase()));
        });
        form.get_field("code").unwrap().set_value(json!("  ab1 "));
        assert_eq!(form.get_value()["code"], json!("AB1"));
    }

    #[test]
    fn reset_when_fires_on_rising_edge_only() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.reset_when("code", |form| form["kind"] == json!("business"));
        });
        let code = form.field_at("code").unwrap();
        let kind = form.get_field("kind").unwrap();

        code.set_value(json!("X"));
        kind.set_value(json!("business"));
        assert_eq!(code.get_value(), json!(""));

        code.set_value(json!("Y"));
        assert_eq!(code.get_value(), json!("Y"));

        kind.set_value(json!("person"));
        kind.set_value(json!("business"));
        assert_eq!(code.get_value(), json!(""));
    }

    #[test]
    fn show_when_toggles_visibility() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.show_when("company", |form| form["kind"] == json!("business"));
        });
        let company = form.get_field("company").unwrap();
        assert!(!company.visible());
        form.get_field("kind").unwrap().set_value(json!("business"));
        assert!(company.visible());
    }

    #[test]
    fn watch_field_and_dispose() {
        let form = order();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let rules = form.apply_behavior_schema(|b| {
            b.watch_field(
                "price",
                move |_| {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                },
                true,
            );
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        form.get_field("price").unwrap().set_value(json!(5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        rules.dispose();
        form.get_field("price").unwrap().set_value(json!(6));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn revalidate_when_reruns_target_validators() {
        let form = order();
        let quantity = form.get_field("quantity").unwrap();
        let price = form.field_at("price").unwrap();
        let limit = form.clone();
        price.add_validator(move |v| {
            let qty = limit.field_at("quantity").map(|q| q.get_value());
            let too_much = v.as_i64().unwrap_or(0) * qty.and_then(|q| q.as_i64()).unwrap_or(0) > 100;
            too_much.then(|| ValidationError::new("limit", "Order too large"))
        });
        let _rules = form.apply_behavior_schema(|b| {
            b.revalidate_when("price", &["quantity"]);
        });

        price.set_value(json!(50));
        assert!(price.valid());
        quantity.set_value(json!(3));
        assert!(price.invalid());
    }

    #[test]
    fn items_and_watch_items_reach_the_list() {
        let form = order();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _rules = form.apply_behavior_schema(move |b| {
            b.items("lines", |item| {
                item.link_fields("qty", "note", |v| json!(format!("{v} pcs")));
            });
            b.watch_items("lines", "qty", move |values| {
                seen_clone.lock().push(values.len());
            });
        });

        let lines = form.array_at("lines").unwrap();
        assert_eq!(lines.at(0).unwrap().get_value()["note"], json!("2 pcs"));
        let added = lines.push(Some(json!({"qty": 5})));
        assert_eq!(added.get_value()["note"], json!("5 pcs"));
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn unresolved_rules_are_noops() {
        let form = order();
        let rules = form.apply_behavior_schema(|b| {
            assert!(b.compute_from(&["nope"], "total", product).is_disposed());
            assert!(b.enable_when("nope", |_| true, EnableWhenOptions::default()).is_disposed());
            assert!(b.items("price", |_| {}).is_disposed());
            assert!(b.is_empty());
        });
        rules.dispose();
    }

    #[test]
    fn custom_effect_tracks_what_it_reads() {
        let form = order();
        let _rules = form.apply_behavior_schema(|b| {
            b.effect(|form| {
                let price = form.field_at("price").map(|p| p.value()).unwrap_or_default();
                if let Some(total) = form.field_at("total") {
                    untracked(|| total.set_value_with(price, SetValueOptions::silent()));
                }
            });
        });
        form.get_field("price").unwrap().set_value(json!(7));
        assert_eq!(form.get_value()["total"], json!(7));
    }
}
