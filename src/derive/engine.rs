// Derivation engine
//
// Turns a class's constructor table into a named structure descriptor. For
// each parameter, in declared order:
//
// 1. an annotation selects the descriptor (recursing into other classes);
// 2. otherwise the default value's shape is inferred;
// 3. otherwise derivation fails with `UnresolvableFieldType`.
//
// Overrides are applied last. Cycles in the class graph are found up front by
// a depth-first walk of the tables, before any nested derivation starts.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::derive::cache::DerivationCache;
use crate::derive::class::{Annotation, ClassRef, Override, Overrides, Param, ParamDefault, ParamKind};
use crate::derive::inference;
use crate::internal::error::{Error, Result, ResultExt};
use crate::schema::defaults::DefaultSpec;
use crate::schema::types::{StructType, TypeDescriptor};

pub(crate) fn derive_uncached(
    class: ClassRef,
    overrides: &Overrides,
    cache: &DerivationCache,
) -> Result<Arc<StructType>> {
    check_cycles(class)?;

    let spec = class.spec();
    for name in overrides.names() {
        if spec.get(name).is_none() {
            return Err(Error::unresolvable(format!("{} has no parameter to override", spec.name)).within(name));
        }
    }

    let mut st = StructType::named(spec.name.as_str());
    for param in &spec.params {
        let field = field_descriptor(param, overrides.get(&param.name), cache).within(param.name.as_str())?;
        st = st.field(param.name.as_str(), field);
    }
    let st = st.bind_class(class.binding(&spec.name));

    debug!(
        class = %spec.name,
        fields = %st.fields().map(|(name, field)| format!("{name}: {field}")).collect::<Vec<_>>().join(", "),
        "derived structure"
    );
    Ok(Arc::new(st))
}

fn field_descriptor(param: &Param, entry: Option<&Override>, cache: &DerivationCache) -> Result<TypeDescriptor> {
    let descriptor = match entry {
        Some(Override::Descriptor(descriptor)) => descriptor.clone(),
        Some(Override::SchemaDefault) => base_descriptor(param, cache)?.0,
        Some(Override::Value(value)) => base_descriptor(param, cache)?.0.default(value.clone()),
        Some(Override::Default(spec)) => base_descriptor(param, cache)?.0.with_default(spec.clone()),
        None => {
            let (base, declared) = base_descriptor(param, cache)?;
            match declared {
                Some(spec) => base.with_default(spec),
                None => base,
            }
        }
    };

    if let DefaultSpec::Constant(value) = descriptor.default_spec() {
        descriptor.validate(value)?;
    }
    descriptor.check_defaults()?;
    Ok(descriptor)
}

// The descriptor with its own default, plus the parameter's declared default.
fn base_descriptor(param: &Param, cache: &DerivationCache) -> Result<(TypeDescriptor, Option<DefaultSpec>)> {
    let annotated = match &param.annotation {
        Some(annotation) => Some(descriptor_for_annotation(annotation, cache)?),
        None => None,
    };
    let base = match param.kind {
        ParamKind::Variadic => {
            Some(TypeDescriptor::list(annotated.unwrap_or_else(TypeDescriptor::any)).empty())
        }
        ParamKind::Keywords => {
            Some(TypeDescriptor::map(annotated.unwrap_or_else(TypeDescriptor::any)).empty())
        }
        ParamKind::Positional => annotated.map(empty_if_constructible),
    };

    match (base, &param.default) {
        (Some(base), ParamDefault::Unset) => Ok((base, None)),
        (Some(base), ParamDefault::Spec(spec)) => Ok((base, Some(spec.clone()))),
        (Some(base), ParamDefault::Instance(class)) => {
            instance_descriptor(*class, cache)?;
            Ok((base, Some(DefaultSpec::Empty)))
        }
        (None, ParamDefault::Unset) => Err(Error::unresolvable(
            "parameter has neither an annotation nor a default to infer a type from",
        )),
        (None, ParamDefault::Spec(DefaultSpec::Constant(value))) => Ok((
            inference::descriptor_for_value(value)?,
            Some(DefaultSpec::Constant(value.clone())),
        )),
        (None, ParamDefault::Spec(DefaultSpec::Now)) => {
            Ok((TypeDescriptor::datetime(), Some(DefaultSpec::Now)))
        }
        (None, ParamDefault::Spec(spec)) => Err(Error::unresolvable(format!(
            "cannot infer a type from a {} default without an annotation",
            spec_name(spec)
        ))),
        (None, ParamDefault::Instance(class)) => {
            let descriptor = instance_descriptor(*class, cache)?;
            Ok((descriptor, Some(DefaultSpec::Empty)))
        }
    }
}

fn descriptor_for_annotation(annotation: &Annotation, cache: &DerivationCache) -> Result<TypeDescriptor> {
    Ok(match annotation {
        Annotation::Any => TypeDescriptor::any(),
        Annotation::Int => TypeDescriptor::int(),
        Annotation::Float => TypeDescriptor::float(),
        Annotation::Str => TypeDescriptor::str(),
        Annotation::Bool => TypeDescriptor::bool(),
        Annotation::Bytes => TypeDescriptor::bytes(),
        Annotation::Datetime => TypeDescriptor::datetime(),
        Annotation::Path => TypeDescriptor::path(),
        Annotation::List(element) => TypeDescriptor::list(descriptor_for_annotation(element, cache)?),
        Annotation::Map(value) => TypeDescriptor::map(descriptor_for_annotation(value, cache)?),
        Annotation::Tuple(elements) => {
            let mut out = Vec::with_capacity(elements.len());
            for (i, element) in elements.iter().enumerate() {
                out.push(descriptor_for_annotation(element, cache).within(i.to_string())?);
            }
            TypeDescriptor::tuple(out)
        }
        Annotation::Class(class) => TypeDescriptor::structure(cache.derive_class(*class, &Overrides::new())?),
        Annotation::Descriptor(descriptor) => descriptor.clone(),
    })
}

// A class that can be built from defaults alone.
fn instance_descriptor(class: ClassRef, cache: &DerivationCache) -> Result<TypeDescriptor> {
    let st = cache.derive_class(class, &Overrides::new())?;
    if !st.is_empty_constructible() {
        return Err(Error::unresolvable(format!(
            "{st} cannot be used as a default: not every field has a default"
        )));
    }
    Ok(TypeDescriptor::structure(st).empty())
}

// Required class-typed fields become `.empty` when the class needs no input.
fn empty_if_constructible(descriptor: TypeDescriptor) -> TypeDescriptor {
    let constructible = !descriptor.has_default()
        && descriptor
            .as_struct()
            .is_some_and(|st| st.class().is_some() && st.is_empty_constructible());
    if constructible {
        descriptor.empty()
    } else {
        descriptor
    }
}

fn spec_name(spec: &DefaultSpec) -> &'static str {
    match spec {
        DefaultSpec::Required => "required",
        DefaultSpec::Constant(_) => "constant",
        DefaultSpec::Factory(_) => "factory",
        DefaultSpec::Now => "now",
        DefaultSpec::Missing => "missing",
        DefaultSpec::Empty => "empty",
    }
}

/// Fails with `DerivationCycleError` if `root` can reach itself.
pub(crate) fn check_cycles(root: ClassRef) -> Result<()> {
    let mut stack = Vec::new();
    let mut finished = HashSet::new();
    visit(root, &mut stack, &mut finished)
}

fn visit(class: ClassRef, stack: &mut Vec<(TypeId, String)>, finished: &mut HashSet<TypeId>) -> Result<()> {
    if finished.contains(&class.type_id()) {
        return Ok(());
    }
    let spec = class.spec();
    if let Some(start) = stack.iter().position(|(id, _)| *id == class.type_id()) {
        let mut chain: Vec<&str> = stack[start..].iter().map(|(_, name)| name.as_str()).collect();
        chain.push(&spec.name);
        return Err(Error::cycle(chain.join(" -> ")));
    }

    stack.push((class.type_id(), spec.name.clone()));
    for param in &spec.params {
        for nested in param.class_refs() {
            visit(nested, stack, finished).within(param.name.as_str())?;
        }
    }
    stack.pop();
    finished.insert(class.type_id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::class::{ClassSpec, ConstructResult, Derive};
    use crate::materialize::Arguments;
    use crate::schema::types::Kind;
    use crate::schema::value::Value;

    struct Owner;
    impl Derive for Owner {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Owner").param(Param::new("name").annotated(Annotation::Str))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Owner)
        }
    }

    struct Trick;
    impl Derive for Trick {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Trick").param(Param::new("name").default("sit"))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Trick)
        }
    }

    struct Dog;
    impl Derive for Dog {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Dog")
                .param(Param::new("name").annotated(Annotation::Str))
                .param(Param::new("owner").annotated(Annotation::class::<Owner>()))
                .param(Param::new("tricks").annotated(Annotation::list(Annotation::class::<Trick>())).empty())
                .param(Param::new("favourite").annotated(Annotation::class::<Trick>()))
                .param(Param::new("good").default(true))
                .param(Param::variadic("rest"))
                .param(Param::keywords("extra"))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Dog)
        }
    }

    struct Untyped;
    impl Derive for Untyped {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Untyped").param(Param::new("mystery"))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Untyped)
        }
    }

    struct Ping;
    struct Pong;
    impl Derive for Ping {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Ping").param(Param::new("pong").annotated(Annotation::class::<Pong>()))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Ping)
        }
    }
    impl Derive for Pong {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Pong").param(Param::new("ping").annotated(Annotation::list(Annotation::class::<Ping>())))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Pong)
        }
    }

    struct Stamp;
    impl Derive for Stamp {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Stamp").param(Param::new("at").annotated(Annotation::Datetime).empty())
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Stamp)
        }
    }

    struct Holder;
    impl Derive for Holder {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Holder").param(Param::new("stamp").annotated(Annotation::class::<Stamp>()))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Holder)
        }
    }

    struct Tally;
    impl Derive for Tally {
        fn class_spec() -> ClassSpec {
            ClassSpec::new("Tally")
                .param(Param::new("counts").annotated(Annotation::Descriptor(
                    TypeDescriptor::default_map(TypeDescriptor::int().required()),
                )))
        }
        fn construct(_: &mut Arguments) -> ConstructResult<Self> {
            Ok(Tally)
        }
    }

    fn field(st: &StructType, name: &str) -> String {
        st.get(name).unwrap().to_string()
    }

    #[test]
    fn test_derive_field_table() {
        let cache = DerivationCache::new();
        let desc = cache.derive::<Dog>().unwrap();
        let st = desc.as_struct().unwrap();
        let names: Vec<&str> = st.field_names().collect();
        assert_eq!(names, vec!["name", "owner", "tricks", "favourite", "good", "rest", "extra"]);
        assert_eq!(field(st, "name"), "Str");
        assert_eq!(field(st, "owner"), "Owner");
        assert_eq!(field(st, "tricks"), "List[Trick].empty");
        assert_eq!(field(st, "favourite"), "Trick.empty");
        assert_eq!(field(st, "good"), "Bool.default(true)");
        assert_eq!(field(st, "rest"), "List[Any].empty");
        assert_eq!(field(st, "extra"), "Map[Str, Any].empty");
        assert!(desc.is_derived_class());
        assert_eq!(st.name(), Some("Dog"));
    }

    #[test]
    fn test_unresolvable_parameter() {
        let err = DerivationCache::new().derive::<Untyped>().unwrap_err();
        assert!(matches!(err, Error::UnresolvableFieldType { .. }));
        assert_eq!(err.path().to_string(), "mystery");
    }

    #[test]
    fn test_empty_without_empty_value_fails_at_derivation() {
        let cache = DerivationCache::new();
        let err = cache.derive::<Holder>().unwrap_err();
        assert!(matches!(err, Error::UnresolvableFieldType { .. }));
        assert_eq!(err.path().to_string(), "stamp.at");
        assert!(err.to_string().contains("Datetime has no empty value"));
    }

    #[test]
    fn test_default_map_value_needs_a_default() {
        let err = DerivationCache::new().derive::<Tally>().unwrap_err();
        assert!(matches!(err, Error::UnresolvableFieldType { .. }));
        assert_eq!(err.path().to_string(), "counts");
    }

    #[test]
    fn test_cycle_is_reported() {
        let err = DerivationCache::new().derive::<Ping>().unwrap_err();
        match &err {
            Error::DerivationCycleError { cycle, path } => {
                assert_eq!(cycle, "Ping -> Pong -> Ping");
                assert_eq!(path.to_string(), "pong.ping");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_overrides_apply_last() {
        let cache = DerivationCache::new();
        let overrides = Overrides::new()
            .value("name", "Rex")
            .schema_default("good")
            .descriptor("owner", TypeDescriptor::str().none());
        let desc = cache.derive_with::<Dog>(&overrides).unwrap();
        let st = desc.as_struct().unwrap();
        assert_eq!(field(st, "name"), "Str.default(\"Rex\")");
        assert_eq!(field(st, "good"), "Bool");
        assert_eq!(field(st, "owner"), "Str.none");
    }

    #[test]
    fn test_override_of_unknown_parameter() {
        let overrides = Overrides::new().value("colour", "brown");
        let err = DerivationCache::new().derive_with::<Dog>(&overrides).unwrap_err();
        assert_eq!(err.path().to_string(), "colour");
    }

    #[test]
    fn test_override_constant_is_validated() {
        let overrides = Overrides::new().value("good", "very");
        let err = DerivationCache::new().derive_with::<Dog>(&overrides).unwrap_err();
        assert!(matches!(err, Error::ValidationError { .. }));
        assert_eq!(err.path().to_string(), "good");
    }

    #[test]
    fn test_cache_is_single_computation_per_key() {
        let cache = DerivationCache::new();
        let first = cache.derive::<Owner>().unwrap();
        let second = cache.derive::<Owner>().unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.computations(), 1);

        cache.derive_with::<Owner>(&Overrides::new().value("name", "Ann")).unwrap();
        assert_eq!(cache.computations(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_derivations_share_one_result() {
        let cache = Arc::new(DerivationCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.derive::<Dog>().unwrap())
            })
            .collect();
        let results: Vec<TypeDescriptor> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for result in &results {
            assert!(Arc::ptr_eq(result.as_struct().unwrap(), results[0].as_struct().unwrap()));
        }
        // Dog, Owner and Trick, once each.
        assert_eq!(cache.computations(), 3);
    }

    #[test]
    fn test_inferred_default_kinds() {
        let cache = DerivationCache::new();
        let st = cache.derive::<Trick>().unwrap();
        let field = st.as_struct().unwrap().get("name").unwrap();
        assert_eq!(field.kind(), &Kind::Str);
        assert_eq!(field.default_spec(), &DefaultSpec::Constant(Value::Str("sit".into())));
    }
}
