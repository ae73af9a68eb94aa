#![allow(deprecated)]

use std::sync::Arc;

use orchard_container::prelude::*;

trait Shape: Send + Sync {
    fn sides(&self) -> u32;
}

struct Circle;
impl Shape for Circle {
    fn sides(&self) -> u32 {
        0
    }
}

struct Square;
impl Shape for Square {
    fn sides(&self) -> u32 {
        4
    }
}

struct Annotation1;
struct Annotation2;

type ShapeKey = TypedKey<dyn Shape>;

#[derive(Debug, Clone, Copy)]
enum Style {
    Constructor,
    Interface,
    Install,
    LegacyInstall,
}

fn circle_component(key: ShapeKey) -> Component {
    Component::builder()
        .register_shared(key, [], |_| Ok(Arc::new(Circle) as Arc<dyn Shape>))
        .build(Signature::provides([key]).unwrap())
}

fn square_component(key: ShapeKey) -> Component {
    Component::builder()
        .register_shared(key, [], |_| Ok(Arc::new(Square) as Arc<dyn Shape>))
        .build(Signature::provides([key]).unwrap())
}

/// Binds `key` in the given style. `second` picks a different
/// implementation so the two bindings are never the same install.
fn bind(builder: ComponentBuilder, style: Style, key: ShapeKey, second: bool) -> ComponentBuilder {
    match (style, second) {
        (Style::Constructor, false) => {
            builder.register_shared(key, [], |_| Ok(Arc::new(Circle) as Arc<dyn Shape>))
        }
        (Style::Constructor, true) => {
            builder.register_shared(key, [], |_| Ok(Arc::new(Square) as Arc<dyn Shape>))
        }
        (Style::Interface, false) => builder
            .bind_interface(key, TypedKey::<Circle>::new(), |c| c as Arc<dyn Shape>)
            .register_constructor(TypedKey::<Circle>::new(), [], |_| Ok(Circle)),
        (Style::Interface, true) => builder
            .bind_interface(key, TypedKey::<Square>::new(), |s| s as Arc<dyn Shape>)
            .register_constructor(TypedKey::<Square>::new(), [], |_| Ok(Square)),
        (Style::Install, false) => builder.install_with(circle_component, key),
        (Style::Install, true) => builder.install_with(square_component, key),
        (Style::LegacyInstall, false) => builder.install_component(circle_component(key)),
        (Style::LegacyInstall, true) => builder.install_component(square_component(key)),
    }
}

fn compose(first: Style, second: Style, key: ShapeKey) -> Component {
    let builder = bind(Component::builder(), first, key, false);
    bind(builder, second, key, true).build(Signature::provides([key]).unwrap())
}

fn shape_keys() -> [ShapeKey; 2] {
    [TypedKey::new(), TypedKey::annotated::<Annotation1>()]
}

fn expect_error(component: Component, kind: ErrorKind, key: Key, case: &str) -> String {
    match Injector::new(component) {
        Ok(_) => panic!("{case}: expected {kind}, got an injector"),
        Err(err) => {
            assert_eq!(err.kind(), kind, "{case}: {err}");
            assert_eq!(err.keys(), vec![key], "{case}");
            assert!(err.is_build_time(), "{case}");
            err.to_string()
        }
    }
}

#[test]
fn clash_with_binding() {
    let cases = [
        (Style::Constructor, Style::Constructor),
        (Style::Constructor, Style::Interface),
        (Style::Interface, Style::Constructor),
        (Style::Interface, Style::Interface),
        (Style::Install, Style::Constructor),
        (Style::Install, Style::Interface),
        (Style::LegacyInstall, Style::Constructor),
        (Style::LegacyInstall, Style::Interface),
    ];

    for key in shape_keys() {
        for (first, second) in cases {
            let case = format!("{first:?} + {second:?} for {key}");
            let message = expect_error(
                compose(first, second, key),
                ErrorKind::TypeAlreadyBound,
                key.key(),
                &case,
            );
            assert!(message.contains("but it is already bound."), "{case}: {message}");
            assert!(message.contains(&key.to_string()), "{case}: {message}");
        }
    }
}

#[test]
fn clash_with_install() {
    let cases = [
        (Style::Constructor, Style::Install),
        (Style::Interface, Style::Install),
        (Style::Install, Style::Install),
        (Style::Constructor, Style::LegacyInstall),
        (Style::Interface, Style::LegacyInstall),
        (Style::LegacyInstall, Style::LegacyInstall),
        (Style::Install, Style::LegacyInstall),
        (Style::LegacyInstall, Style::Install),
    ];

    for key in shape_keys() {
        for (first, second) in cases {
            let case = format!("{first:?} + {second:?} for {key}");
            let message = expect_error(
                compose(first, second, key),
                ErrorKind::DuplicateTypesInComponent,
                key.key(),
                &case,
            );
            assert!(
                message.contains(
                    "The installed component provides some types that are already provided by the current component."
                ),
                "{case}: {message}"
            );
        }
    }
}

#[test]
fn no_clash_with_different_annotations() {
    let styles = [
        Style::Constructor,
        Style::Interface,
        Style::Install,
        Style::LegacyInstall,
    ];
    let first_key = TypedKey::<dyn Shape>::annotated::<Annotation1>();
    let second_key = TypedKey::<dyn Shape>::annotated::<Annotation2>();

    for first in styles {
        for second in styles {
            let case = format!("{first:?} + {second:?}");
            let builder = bind(Component::builder(), first, first_key, false);
            let component = bind(builder, second, second_key, true)
                .build(Signature::provides([first_key, second_key]).unwrap());

            let injector = match Injector::new(component) {
                Ok(injector) => injector,
                Err(err) => panic!("{case}: {err}"),
            };
            assert_eq!(injector.get_key(first_key).unwrap().sides(), 0, "{case}");
            assert_eq!(injector.get_key(second_key).unwrap().sides(), 4, "{case}");
        }
    }
}

#[test]
fn annotated_and_plain_never_clash() {
    let plain = TypedKey::<dyn Shape>::new();
    let annotated = TypedKey::<dyn Shape>::annotated::<Annotation1>();
    let component = Component::builder()
        .install_with(circle_component, plain)
        .install_with(square_component, annotated)
        .build(Signature::provides([plain, annotated]).unwrap());

    let injector = Injector::new(component).unwrap();
    assert_eq!(injector.get::<dyn Shape>().unwrap().sides(), 0);
    assert_eq!(
        injector
            .get_annotated::<Annotation1, dyn Shape>()
            .unwrap()
            .sides(),
        4
    );
}

#[test]
fn same_install_twice_is_merged_once() {
    let key = TypedKey::<dyn Shape>::new();
    let component = Component::builder()
        .install_with(circle_component, key)
        .install_with(circle_component, key)
        .build(Signature::provides([key]).unwrap());

    let injector = Injector::new(component).unwrap();
    assert_eq!(injector.get_key(key).unwrap().sides(), 0);
}

#[test]
fn legacy_install_is_never_deduplicated() {
    let key = TypedKey::<dyn Shape>::new();
    let component = Component::builder()
        .install_component(circle_component(key))
        .install_component(circle_component(key))
        .build(Signature::provides([key]).unwrap());

    assert_eq!(component.deprecations().len(), 2);
    expect_error(
        component,
        ErrorKind::DuplicateTypesInComponent,
        key.key(),
        "legacy + legacy",
    );
}

#[test]
fn duplicate_keys_reported_in_order() {
    struct Width;
    struct Height;

    fn dimensions() -> Component {
        Component::builder()
            .bind_instance(TypedKey::<u8>::new(), Arc::new(1))
            .register_constructor(TypedKey::<Width>::new(), [], |_| Ok(Width))
            .register_constructor(TypedKey::<Height>::new(), [], |_| Ok(Height))
            .build(Signature::provides([Key::of::<Width>(), Key::of::<Height>()]).unwrap())
    }

    let component = Component::builder()
        .register_constructor(TypedKey::<Height>::new(), [], |_| Ok(Height))
        .bind_instance(TypedKey::<u8>::new(), Arc::new(2))
        .register_constructor(TypedKey::<Width>::new(), [], |_| Ok(Width))
        .install(dimensions)
        .build(Signature::provides([Key::of::<Width>()]).unwrap());

    match Injector::new(component) {
        Err(OrchardError::DuplicateTypesInComponent { keys }) => {
            assert_eq!(keys, vec![Key::of::<Width>(), Key::of::<Height>()]);
        }
        Err(other) => panic!("Expected DuplicateTypesInComponent, got: {other:?}"),
        Ok(_) => panic!("Expected DuplicateTypesInComponent, got an injector"),
    }
}

#[test]
fn repeated_types_in_signature() {
    struct X;

    let err = Signature::new([Key::of::<X>()], [Key::of::<X>()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RepeatedTypes);
    assert!(err.to_string().starts_with("RepeatedTypesError<"));

    let annotated = Key::annotated::<Annotation1, X>();
    let err = Signature::provides([annotated, annotated]).unwrap_err();
    assert_eq!(err.keys(), vec![annotated, annotated]);
}

#[test]
fn required_types_not_first() {
    struct X;
    struct Y;

    let err = Signature::parse([
        TypeArg::provided(Key::of::<X>()),
        TypeArg::required([Key::of::<Y>()]),
    ])
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RequiredTypesInComponentArguments);
    assert!(err.to_string().contains("may only be the first argument"));
}
