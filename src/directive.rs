//! Provider instances and their lifecycle hooks.
//!
//! Every provider node owns one [`Instance`]. Components, directives and plain
//! services all implement [`Directive`]; every hook has an empty default so a
//! service only writes `impl Directive for MyService {}`.

use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::types::{NodeFlags, Value};

/// Behavior of a provider instance as seen by the change detector.
///
/// Hooks take `&self`; instances that keep state use `Cell`/`RefCell`.
pub trait Directive: Any {
    /// A directive-property binding or a query result changed.
    fn set_input(&self, _name: &str, _value: &Value) {}
    fn on_changes(&self, _changes: &SimpleChanges) {}
    fn on_init(&self) {}
    fn do_check(&self) {}
    fn after_content_init(&self) {}
    fn after_content_checked(&self) {}
    fn after_view_init(&self) {}
    fn after_view_checked(&self) {}
    fn on_destroy(&self) {}
}

/// Shared handle to a provider instance.
pub type Instance = Rc<dyn Directive>;

/// Downcast an instance to its concrete type.
pub fn downcast_instance<T: Directive>(instance: &Instance) -> Option<Rc<T>> {
    let any: Rc<dyn Any> = instance.clone();
    any.downcast::<T>().ok()
}

/// Wrap an instance as a binding value (what provider queries collect).
pub fn instance_value(instance: &Instance) -> Value {
    let any: Rc<dyn Any> = instance.clone();
    Value::Object(any)
}

/// One changed directive input.
#[derive(Debug, Clone)]
pub struct SimpleChange {
    pub previous: Value,
    pub current: Value,
    pub first_change: bool,
}

/// Changed inputs of one check, keyed by input name.
pub type SimpleChanges = BTreeMap<Rc<str>, SimpleChange>;

/// Invoke every hook in `hooks` on `instance`.
pub(crate) fn call_lifecycle_hooks(instance: &dyn Directive, hooks: NodeFlags) {
    if hooks.contains(NodeFlags::AFTER_CONTENT_INIT) {
        instance.after_content_init();
    }
    if hooks.contains(NodeFlags::AFTER_CONTENT_CHECKED) {
        instance.after_content_checked();
    }
    if hooks.contains(NodeFlags::AFTER_VIEW_INIT) {
        instance.after_view_init();
    }
    if hooks.contains(NodeFlags::AFTER_VIEW_CHECKED) {
        instance.after_view_checked();
    }
    if hooks.contains(NodeFlags::ON_DESTROY) {
        instance.on_destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<&'static str>>,
    }

    impl Directive for Recorder {
        fn after_content_init(&self) {
            self.calls.borrow_mut().push("after_content_init");
        }
        fn after_content_checked(&self) {
            self.calls.borrow_mut().push("after_content_checked");
        }
        fn on_destroy(&self) {
            self.calls.borrow_mut().push("on_destroy");
        }
    }

    #[test]
    fn test_hooks_follow_flags() {
        let recorder = Recorder::default();
        call_lifecycle_hooks(
            &recorder,
            NodeFlags::AFTER_CONTENT_CHECKED | NodeFlags::AFTER_CONTENT_INIT,
        );
        call_lifecycle_hooks(&recorder, NodeFlags::ON_DESTROY);
        assert_eq!(
            *recorder.calls.borrow(),
            vec!["after_content_init", "after_content_checked", "on_destroy"]
        );
    }

    #[test]
    fn test_downcast_instance() {
        let instance: Instance = Rc::new(Recorder::default());
        assert!(downcast_instance::<Recorder>(&instance).is_some());

        let value = instance_value(&instance);
        assert!(value.downcast_ref::<Recorder>().is_some());
    }
}
