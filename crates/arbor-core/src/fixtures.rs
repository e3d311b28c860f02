//! Test fixtures for Arbor development and testing.
//!
//! This module provides pre-built component indexes that can be used in tests
//! and doc examples across the Arbor workspace.
//!
//! # Example
//!
//! ```
//! use arbor_core::fixtures;
//! use arbor_core::index::IndexView;
//! use arbor_core::names::ClassName;
//!
//! let index = fixtures::greeting_index();
//! assert!(index.class(&ClassName::new(fixtures::ENGLISH_GREETER)).is_some());
//! ```

use crate::annotation::{AnnotationInstance, AnnotationValue};
use crate::index::{ClassInfo, FieldInfo, MemoryIndex, MethodInfo, ParameterInfo};
use crate::names;

/// Interface implemented by the greeter beans.
pub const GREETER: &str = "acme.greeting.Greeter";
/// Application-scoped greeter.
pub const ENGLISH_GREETER: &str = "acme.greeting.EnglishGreeter";
/// Singleton service injecting the greeter.
pub const GREETING_SERVICE: &str = "acme.greeting.GreetingService";
/// Dependent bean without explicit scope.
pub const CLOCK: &str = "acme.greeting.Clock";
/// Interceptor binding applied to the greeter.
pub const LOGGED: &str = "acme.greeting.Logged";
/// Interceptor bound to [`LOGGED`].
pub const LOGGING_INTERCEPTOR: &str = "acme.greeting.LoggingInterceptor";
/// String type used by the fixtures.
pub const STRING: &str = "arbor.lang.String";

/// Annotation type registered as a qualifier with no members.
pub const TO_BE_QUALIFIER: &str = "acme.qualifiers.ToBeQualifier";
/// Annotation type registered as a qualifier with a non-binding `value` and a binding `age`.
pub const BINDING_FIELD_QUALIFIER: &str = "acme.qualifiers.ToBeQualifierWithBindingField";
/// Qualifier declared through the meta-annotation, `label` is non-binding.
pub const REGION: &str = "acme.qualifiers.Region";
/// Bean carrying [`TO_BE_QUALIFIER`].
pub const ALPHA: &str = "acme.qualifiers.Alpha";
/// Bean carrying [`BINDING_FIELD_QUALIFIER`] with `value = "X", age = 10`.
pub const BRAVO: &str = "acme.qualifiers.Bravo";

fn annotation(name: &str) -> AnnotationInstance {
    AnnotationInstance::new(name)
}

/// Creates an index with a small greeting application.
///
/// - `Greeter` interface with `greet(String) -> String`
/// - `EnglishGreeter`: `@ApplicationScoped @Logged`, implements `Greeter`
/// - `GreetingService`: `@Singleton`, injects `Greeter` into a field
/// - `Clock`: `@Dependent`
/// - `Logged` interceptor binding and `LoggingInterceptor` at priority 2000
#[must_use]
pub fn greeting_index() -> MemoryIndex {
    let greet = MethodInfo::new("greet")
        .param(ParameterInfo::new(STRING).named("name"))
        .returns(STRING);

    MemoryIndex::builder()
        .class(ClassInfo::interface(GREETER).with_method(greet.clone()))
        .class(ClassInfo::annotation_type(LOGGED).annotated(annotation(names::INTERCEPTOR_BINDING)))
        .class(
            ClassInfo::class(ENGLISH_GREETER)
                .implements(GREETER)
                .annotated(annotation(names::APPLICATION_SCOPED))
                .annotated(annotation(LOGGED))
                .no_arg_constructor()
                .with_method(greet),
        )
        .class(
            ClassInfo::class(GREETING_SERVICE)
                .annotated(annotation(names::SINGLETON))
                .with_field(FieldInfo::new("greeter", GREETER).annotated(annotation(names::INJECT)))
                .with_method(
                    MethodInfo::new("welcome")
                        .param(ParameterInfo::new(STRING))
                        .returns(STRING),
                ),
        )
        .class(ClassInfo::class(CLOCK).annotated(annotation(names::DEPENDENT)))
        .class(
            ClassInfo::class(LOGGING_INTERCEPTOR)
                .annotated(annotation(names::INTERCEPTOR))
                .annotated(annotation(LOGGED))
                .annotated(annotation(names::PRIORITY).with("value", 2000))
                .with_method(
                    MethodInfo::new("log")
                        .annotated(annotation(names::AROUND_INVOKE))
                        .returns(names::OBJECT),
                ),
        )
        .build()
}

/// Creates an index with qualifier annotation types that are not meta-annotated.
///
/// They become qualifiers only when registered dynamically, mirroring a
/// qualifier registrar contributed by an extension.
#[must_use]
pub fn qualifier_index() -> MemoryIndex {
    MemoryIndex::builder()
        .class(ClassInfo::annotation_type(TO_BE_QUALIFIER))
        .class(
            ClassInfo::annotation_type(BINDING_FIELD_QUALIFIER)
                .with_method(MethodInfo::member("value", STRING, None))
                .with_method(MethodInfo::member("age", "arbor.lang.Integer", None)),
        )
        .class(
            ClassInfo::annotation_type(REGION)
                .annotated(annotation(names::QUALIFIER))
                .with_method(MethodInfo::member("code", STRING, None))
                .with_method(
                    MethodInfo::member("label", STRING, Some(AnnotationValue::from("")))
                        .annotated(annotation(names::NONBINDING)),
                ),
        )
        .class(
            ClassInfo::class(ALPHA)
                .annotated(annotation(names::APPLICATION_SCOPED))
                .annotated(annotation(TO_BE_QUALIFIER))
                .no_arg_constructor(),
        )
        .class(
            ClassInfo::class(BRAVO)
                .annotated(annotation(names::DEPENDENT))
                .annotated(annotation(BINDING_FIELD_QUALIFIER).with("value", "X").with("age", 10)),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexView;
    use crate::names::ClassName;

    #[test]
    fn test_greeting_index_shape() {
        let index = greeting_index();
        assert_eq!(index.len(), 6);
        let english = index.class(&ClassName::new(ENGLISH_GREETER)).expect("greeter");
        assert!(english.has(LOGGED));
        assert!(index.is_subtype(&english.name, &ClassName::new(GREETER)));
    }

    #[test]
    fn test_qualifier_index_shape() {
        let index = qualifier_index();
        let bravo = index.class(&ClassName::new(BRAVO)).expect("bravo");
        let qualifier = bravo.annotation(BINDING_FIELD_QUALIFIER).expect("qualifier");
        assert_eq!(qualifier.int("age"), Some(10));
        assert_eq!(qualifier.string("value"), Some("X"));
    }
}
