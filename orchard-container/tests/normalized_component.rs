use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use orchard_container::prelude::*;

#[derive(Debug)]
struct X;
struct Y;
struct Annotation1;

fn requires_x(x: Key) -> Component {
    Component::builder()
        .register_constructor(TypedKey::<Y>::new(), [Dep::from(x)], |_| Ok(Y))
        .build(Signature::new([x], [Key::of::<Y>()]).unwrap())
}

#[test]
fn unsatisfied_requirements() {
    for x in [Key::of::<X>(), Key::annotated::<Annotation1, X>()] {
        let normalized = NormalizedComponent::new(requires_x(x)).unwrap();
        assert_eq!(normalized.required(), &[x]);

        let empty = Component::builder().build(Signature::empty());
        match Injector::from_normalized(&normalized, empty) {
            Err(OrchardError::UnsatisfiedRequirementsInNormalizedComponent { keys }) => {
                assert_eq!(keys, vec![x]);
            }
            Err(other) => panic!("Expected UnsatisfiedRequirementsInNormalizedComponent, got: {other:?}"),
            Ok(_) => panic!("Expected UnsatisfiedRequirementsInNormalizedComponent, got an injector"),
        }
    }
}

#[test]
fn unsatisfied_requirements_message() {
    let normalized = NormalizedComponent::new(requires_x(Key::of::<X>())).unwrap();
    let err = Injector::builder()
        .normalized(&normalized)
        .build()
        .err()
        .unwrap();
    let message = err.to_string();
    assert!(message.starts_with("UnsatisfiedRequirementsInNormalizedComponentError<"));
    assert!(message.contains("are required by the NormalizedComponent but are not provided by the Component"));
}

#[test]
fn requirements_met_by_component() {
    for x in [Key::of::<X>(), Key::annotated::<Annotation1, X>()] {
        let normalized = NormalizedComponent::new(requires_x(x)).unwrap();
        let provider = Component::builder()
            .register_constructor(TypedKey::<X>::new(), [], |_| Ok(X))
            .register_constructor(TypedKey::<X>::annotated::<Annotation1>(), [], |_| Ok(X))
            .build(Signature::provides([x]).unwrap());

        let injector = Injector::from_normalized(&normalized, provider).unwrap();
        assert!(injector.get::<Y>().is_ok());
    }
}

#[test]
fn component_repeating_normalized_type() {
    for x in [Key::of::<X>(), Key::annotated::<Annotation1, X>()] {
        let provides_x = move || {
            Component::builder()
                .register_constructor(TypedKey::<X>::new(), [], |_| Ok(X))
                .register_constructor(TypedKey::<X>::annotated::<Annotation1>(), [], |_| Ok(X))
                .build(Signature::provides([x]).unwrap())
        };

        let normalized = NormalizedComponent::new(provides_x()).unwrap();
        match Injector::from_normalized(&normalized, provides_x()) {
            Err(OrchardError::DuplicateTypesInComponent { keys }) => {
                assert!(keys.contains(&x), "{keys:?}");
            }
            Err(other) => panic!("Expected DuplicateTypesInComponent, got: {other:?}"),
            Ok(_) => panic!("Expected DuplicateTypesInComponent, got an injector"),
        }
    }
}

#[test]
fn component_needing_normalized_type() {
    let normalized = NormalizedComponent::new(
        Component::builder()
            .register_constructor(TypedKey::<X>::new(), [], |_| Ok(X))
            .build(Signature::provides([Key::of::<X>()]).unwrap()),
    )
    .unwrap();

    let injector = Injector::from_normalized(&normalized, requires_x(Key::of::<X>())).unwrap();
    assert!(injector.get::<Y>().is_ok());
    assert!(injector.get::<X>().is_ok());
}

#[test]
fn unmet_component_requirements() {
    let err = Injector::new(requires_x(Key::of::<X>())).err().unwrap();
    match err {
        OrchardError::UnsatisfiedRequirements { keys } => assert_eq!(keys, vec![Key::of::<X>()]),
        other => panic!("Expected UnsatisfiedRequirements, got: {other:?}"),
    }
}

#[test]
fn installed_requirements_met_by_installing_component() {
    fn needs_x_and_y() -> Component {
        Component::builder()
            .build(Signature::new([Key::of::<X>(), Key::of::<Y>()], Vec::<Key>::new()).unwrap())
    }

    let component = Component::builder()
        .install(needs_x_and_y)
        .register_constructor(TypedKey::<X>::new(), [], |_| Ok(X))
        .register_constructor(TypedKey::<Y>::new(), [], |_| Ok(Y))
        .build(Signature::provides([Key::of::<X>(), Key::of::<Y>()]).unwrap());

    let normalized = NormalizedComponent::new(component).unwrap();
    assert!(normalized.required().is_empty());

    let injector =
        Injector::from_normalized(&normalized, Component::builder().build(Signature::empty())).unwrap();
    assert!(injector.get::<X>().is_ok());
    assert!(injector.get::<Y>().is_ok());
}

#[test]
fn reused_across_injectors() {
    struct Name(String);
    struct Greeting(String);

    let normalized = NormalizedComponent::new(
        Component::builder()
            .register_constructor(
                TypedKey::<Greeting>::new(),
                [Dep::from(Key::of::<Name>())],
                |args| Ok(Greeting(format!("hello {}", args.get(TypedKey::<Name>::new())?.0))),
            )
            .build(Signature::new([Key::of::<Name>()], [Key::of::<Greeting>()]).unwrap()),
    )
    .unwrap();

    for name in ["ada", "grace"] {
        let component = Component::builder()
            .bind_instance(TypedKey::new(), Arc::new(Name(name.to_string())))
            .build(Signature::provides([Key::of::<Name>()]).unwrap());
        let injector = Injector::from_normalized(&normalized, component).unwrap();
        assert_eq!(injector.get::<Greeting>().unwrap().0, format!("hello {name}"));
    }
}

static WHEEL_COMPONENTS: AtomicUsize = AtomicUsize::new(0);

struct Wheel;

fn wheel_component() -> Component {
    WHEEL_COMPONENTS.fetch_add(1, Ordering::SeqCst);
    Component::builder()
        .register_constructor(TypedKey::<Wheel>::new(), [], |_| Ok(Wheel))
        .build(Signature::provides([Key::of::<Wheel>()]).unwrap())
}

#[test]
fn installs_expanded_by_normalized_component_are_skipped() {
    let normalized = NormalizedComponent::new(
        Component::builder()
            .install(wheel_component)
            .build(Signature::provides([Key::of::<Wheel>()]).unwrap()),
    )
    .unwrap();
    assert_eq!(WHEEL_COMPONENTS.load(Ordering::SeqCst), 1);

    let component = Component::builder()
        .install(wheel_component)
        .build(Signature::provides([Key::of::<Wheel>()]).unwrap());
    let injector = Injector::from_normalized(&normalized, component).unwrap();

    assert_eq!(WHEEL_COMPONENTS.load(Ordering::SeqCst), 1);
    assert!(injector.get::<Wheel>().is_ok());
}

static ENGINES_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Engine;

impl Injectable for Engine {
    fn inject(_: &Args<'_>) -> Result<Self> {
        ENGINES_BUILT.fetch_add(1, Ordering::SeqCst);
        Ok(Engine)
    }
}

orchard_container::injectable!(Engine);

#[test]
fn self_declared_type_in_both_sources_is_built_once() {
    for key in [TypedKey::<Engine>::new(), TypedKey::<Engine>::annotated::<Annotation1>()] {
        let provides_engine = || Component::builder().build(Signature::provides([key]).unwrap());

        let normalized = NormalizedComponent::new(provides_engine()).unwrap();
        let injector = Injector::from_normalized(&normalized, provides_engine()).unwrap();

        let built_before = ENGINES_BUILT.load(Ordering::SeqCst);
        let first = injector.get_key(key).unwrap();
        let second = injector.get_key(key).unwrap();
        assert!(Arc::ptr_eq(&first, &second), "{}", key.key());
        assert_eq!(ENGINES_BUILT.load(Ordering::SeqCst) - built_before, 1, "{}", key.key());
    }
}

#[test]
fn explicit_and_self_declared_clash() {
    let normalized = NormalizedComponent::new(
        Component::builder().build(Signature::provides([Key::of::<Engine>()]).unwrap()),
    )
    .unwrap();
    let explicit = Component::builder()
        .register_constructor(TypedKey::<Engine>::new(), [], |_| Ok(Engine))
        .build(Signature::provides([Key::of::<Engine>()]).unwrap());

    match Injector::from_normalized(&normalized, explicit) {
        Err(OrchardError::DuplicateTypesInComponent { keys }) => {
            assert_eq!(keys, vec![Key::of::<Engine>()]);
        }
        Err(other) => panic!("Expected DuplicateTypesInComponent, got: {other:?}"),
        Ok(_) => panic!("Expected DuplicateTypesInComponent, got an injector"),
    }
}

#[test]
fn shared_instance_in_both_sources() {
    let x = Arc::new(X);
    let normalized = NormalizedComponent::new(
        Component::builder()
            .bind_instance(TypedKey::new(), x.clone())
            .build(Signature::provides([Key::of::<X>()]).unwrap()),
    )
    .unwrap();

    let same = Component::builder()
        .bind_instance(TypedKey::new(), x.clone())
        .build(Signature::provides([Key::of::<X>()]).unwrap());
    let injector = Injector::from_normalized(&normalized, same).unwrap();
    assert!(Arc::ptr_eq(&injector.get::<X>().unwrap(), &x));

    let different = Component::builder()
        .bind_instance(TypedKey::new(), Arc::new(X))
        .build(Signature::provides([Key::of::<X>()]).unwrap());
    let injector = Injector::from_normalized(&normalized, different).unwrap();
    match injector.get::<X>().unwrap_err() {
        OrchardError::InconsistentBindings { key } => assert_eq!(key, Key::of::<X>()),
        other => panic!("Expected InconsistentBindings, got: {other:?}"),
    }
}
