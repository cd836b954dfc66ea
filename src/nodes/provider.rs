//! Provider nodes: directive, component and service instances.
//!
//! Dependencies resolve from the providers of enclosing elements in the same
//! view (nearest first), then from the root injector.

use tracing::trace;

use crate::definition::NodeDef;
use crate::directive::{Instance, SimpleChange, SimpleChanges};
use crate::error::ViewError;
use crate::types::{NodeFlags, NodeType, Token, Value, ViewFlags, ViewState};
use crate::view::{NodeData, ViewData};

pub(crate) fn create_instance(view: &ViewData, node: &NodeDef) -> Result<Instance, ViewError> {
    let Some(provider) = node.as_provider() else {
        return Err(ViewError::NodeTypeMismatch {
            index: node.index,
            expected: NodeType::Provider,
        });
    };
    let deps = provider
        .deps
        .iter()
        .map(|&token| resolve_dep(view, node, token))
        .collect::<Result<Vec<_>, _>>()?;
    trace!(index = node.index, token = provider.token.0, deps = deps.len(), "create provider");
    Ok((provider.factory)(&deps))
}

fn resolve_dep(view: &ViewData, node: &NodeDef, token: Token) -> Result<Instance, ViewError> {
    let mut element_index = node.render_parent;
    while let Some(index) = element_index {
        let element_node = &view.def.nodes[index];
        let local = element_node
            .as_element()
            .and_then(|element| element.provider_index(token))
            .filter(|&provider| provider != node.index);
        // Providers declared later on the same element don't exist yet.
        if let Some(NodeData::Provider(data)) = local.and_then(|provider| view.nodes.get(provider)) {
            return Ok(data.instance.clone());
        }
        element_index = element_node.render_parent;
    }
    view.root.injector.get(token).ok_or(ViewError::NoProvider {
        token,
        index: node.index,
    })
}

/// Push changed inputs, then run OnChanges, OnInit (first check) and DoCheck.
pub(crate) fn check_and_update(
    view: &mut ViewData,
    node: &NodeDef,
    values: &[Value],
) -> Result<(), ViewError> {
    let instance = view.provider(node.index)?.instance.clone();

    let mut changes: Option<SimpleChanges> = None;
    for (i, value) in values.iter().enumerate() {
        let previous = view.old_values[node.binding_index + i].clone();
        if !super::check_and_update_binding(view, node, i, value) {
            continue;
        }
        let Some(name) = node.bindings[i].name.clone() else {
            continue;
        };
        instance.set_input(&name, value);
        if node.flags.contains(NodeFlags::ON_CHANGES) {
            changes.get_or_insert_default().insert(
                name,
                SimpleChange {
                    previous,
                    current: value.clone(),
                    first_change: view.first_change,
                },
            );
        }
        mark_component_for_check(view, node.index)?;
    }

    if let Some(changes) = changes {
        instance.on_changes(&changes);
    }
    if view.first_change && node.flags.contains(NodeFlags::ON_INIT) {
        instance.on_init();
    }
    if node.flags.contains(NodeFlags::DO_CHECK) {
        instance.do_check();
    }
    Ok(())
}

fn mark_component_for_check(view: &mut ViewData, index: usize) -> Result<(), ViewError> {
    if let Some(component_view) = view.provider_mut(index)?.component_view.as_deref_mut() {
        if component_view.def.flags.contains(ViewFlags::ON_PUSH) {
            component_view.state.insert(ViewState::CHECKS_ENABLED);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::definition::{NodeDef, ViewDefinition};
    use crate::directive::{Directive, SimpleChanges};
    use crate::error::ViewError;
    use crate::types::{NodeFlags, Token, Value};
    use crate::view::{RootData, StaticInjector, check_and_update_view, create_root_view};

    #[derive(Default)]
    struct Logger {
        lines: RefCell<Vec<String>>,
    }

    impl Directive for Logger {}

    struct Greeter {
        logger: Rc<Logger>,
        name: RefCell<Value>,
        events: RefCell<Vec<String>>,
    }

    impl Directive for Greeter {
        fn set_input(&self, name: &str, value: &Value) {
            if name == "name" {
                *self.name.borrow_mut() = value.clone();
            }
        }
        fn on_changes(&self, changes: &SimpleChanges) {
            for (name, change) in changes {
                self.events.borrow_mut().push(format!(
                    "changes {name}: {} -> {} first={}",
                    change.previous, change.current, change.first_change
                ));
            }
        }
        fn on_init(&self) {
            self.events.borrow_mut().push("init".into());
            self.logger.lines.borrow_mut().push(format!("hello {}", self.name.borrow()));
        }
        fn do_check(&self) {
            self.events.borrow_mut().push("check".into());
        }
    }

    fn greeter_def(name: Rc<RefCell<Value>>) -> Rc<ViewDefinition> {
        ViewDefinition::builder()
            .node(NodeDef::element("greeting").with_child_count(1))
            .node(
                NodeDef::provider(Token("Greeter"), |deps| {
                    let logger = crate::directive::downcast_instance::<Logger>(&deps[0])
                        .unwrap_or_default();
                    Rc::new(Greeter {
                        logger,
                        name: RefCell::new(Value::Undefined),
                        events: RefCell::default(),
                    })
                })
                .with_deps([Token("Logger")])
                .with_props(["name"])
                .with_flags(NodeFlags::ON_CHANGES | NodeFlags::ON_INIT | NodeFlags::DO_CHECK),
            )
            .update(move |check| {
                let name = name.borrow().clone();
                check.inline(1, &[name])?;
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_hooks_and_changes() {
        let logger = Rc::new(Logger::default());
        let root = RootData::headless()
            .with_injector(Rc::new(StaticInjector::new().with(Token("Logger"), logger.clone())));
        let name = Rc::new(RefCell::new(Value::from("Ada")));
        let mut view = create_root_view(Rc::new(root), greeter_def(name.clone()), Value::Undefined).unwrap();

        check_and_update_view(&mut view).unwrap();
        check_and_update_view(&mut view).unwrap();
        *name.borrow_mut() = Value::from("Grace");
        check_and_update_view(&mut view).unwrap();

        let greeter = view.instance_as::<Greeter>(1).unwrap().unwrap();
        assert_eq!(
            *greeter.events.borrow(),
            vec![
                "changes name: undefined -> Ada first=true",
                "init",
                "check",
                "check",
                "changes name: Ada -> Grace first=false",
                "check",
            ]
        );
        assert_eq!(*logger.lines.borrow(), vec!["hello Ada"]);
    }

    #[test]
    fn test_missing_dependency() {
        let name = Rc::new(RefCell::new(Value::Null));
        let err = create_root_view(Rc::new(RootData::headless()), greeter_def(name), Value::Undefined)
            .unwrap_err();
        assert!(matches!(
            err,
            ViewError::NoProvider {
                token: Token("Logger"),
                index: 1
            }
        ));
    }

    #[test]
    fn test_dependency_from_enclosing_element() {
        let def = ViewDefinition::builder()
            .node(NodeDef::element("outer").with_child_count(3))
            .node(NodeDef::provider(Token("Logger"), |_| Rc::new(Logger::default())))
            .node(NodeDef::element("inner").with_child_count(1))
            .node(
                NodeDef::provider(Token("User"), |deps| {
                    deps[0].on_init();
                    Rc::new(Logger::default())
                })
                .with_deps([Token("Logger")]),
            )
            .build()
            .unwrap();

        assert!(create_root_view(Rc::new(RootData::headless()), def, Value::Undefined).is_ok());
    }
}
