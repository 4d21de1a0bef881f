use shapecast::cli::{CliOutcome, CliParser};
use shapecast::codec::json;
use shapecast::derive::DerivationCache;
use shapecast::{
    derive, derive_with, from_target, materialize, Annotation, Arguments, ClassSpec, ConstructError,
    ConstructResult, Derive, EnumType, Envelope, Error, Overrides, Param, SchemaRegistry, SchemaSnapshot, Target,
    TypeDescriptor, Value,
};

#[derive(Debug, PartialEq)]
struct Owner {
    name: String,
}

impl Derive for Owner {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Owner").param(Param::new("name").annotated(Annotation::Str))
    }

    fn construct(args: &mut Arguments) -> ConstructResult<Self> {
        Ok(Owner { name: args.value("name")? })
    }
}

#[derive(Debug, PartialEq)]
struct Trick {
    name: String,
    difficulty: i64,
}

impl Derive for Trick {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Trick")
            .param(Param::new("name").annotated(Annotation::Str))
            .param(Param::new("difficulty").default(1))
    }

    fn construct(args: &mut Arguments) -> ConstructResult<Self> {
        Ok(Trick { name: args.value("name")?, difficulty: args.value("difficulty")? })
    }
}

#[derive(Debug, PartialEq)]
struct Dog {
    name: String,
    owner: Owner,
    tricks: Vec<Trick>,
}

impl Derive for Dog {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Dog")
            .param(Param::new("name").annotated(Annotation::Str))
            .param(Param::new("owner").annotated(Annotation::class::<Owner>()))
            .param(Param::new("tricks").annotated(Annotation::list(Annotation::class::<Trick>())).empty())
    }

    fn construct(args: &mut Arguments) -> ConstructResult<Self> {
        let name: String = args.value("name")?;
        if name.trim().is_empty() {
            return Err(ConstructError::at("name", "a dog needs a name"));
        }
        Ok(Dog { name, owner: args.instance("owner")?, tricks: args.instances("tricks")? })
    }
}

struct Keeper;

impl Derive for Keeper {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Keeper").param(Param::new("badge"))
    }

    fn construct(_: &mut Arguments) -> ConstructResult<Self> {
        Ok(Keeper)
    }
}

struct Kennel;

impl Derive for Kennel {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Kennel")
            .param(Param::new("name").annotated(Annotation::Str))
            .param(Param::new("keeper").annotated(Annotation::class::<Keeper>()))
    }

    fn construct(_: &mut Arguments) -> ConstructResult<Self> {
        Ok(Kennel)
    }
}

#[derive(Debug, PartialEq)]
struct Module {
    layers: i64,
    activation: String,
}

impl Derive for Module {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Module")
            .param(Param::new("layers").annotated(Annotation::Int).default(42))
            .param(Param::new("activation").default("relu"))
    }

    fn construct(args: &mut Arguments) -> ConstructResult<Self> {
        Ok(Module { layers: args.value("layers")?, activation: args.value("activation")? })
    }
}

#[derive(Debug, PartialEq)]
struct Trainer {
    module: Module,
    epochs: i64,
    verbose: bool,
}

impl Derive for Trainer {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Trainer")
            .param(Param::new("module").annotated(Annotation::class::<Module>()))
            .param(Param::new("epochs").default(10))
            .param(Param::new("verbose").default(false))
    }

    fn construct(args: &mut Arguments) -> ConstructResult<Self> {
        Ok(Trainer {
            module: args.instance("module")?,
            epochs: args.value("epochs")?,
            verbose: args.value("verbose")?,
        })
    }
}

struct Reading;

impl Derive for Reading {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Reading").param(Param::new("taken").annotated(Annotation::Datetime).empty())
    }

    fn construct(_: &mut Arguments) -> ConstructResult<Self> {
        Ok(Reading)
    }
}

struct Sensor;

impl Derive for Sensor {
    fn class_spec() -> ClassSpec {
        ClassSpec::new("Sensor").param(Param::new("last").annotated(Annotation::class::<Reading>()))
    }

    fn construct(_: &mut Arguments) -> ConstructResult<Self> {
        Ok(Sensor)
    }
}

#[derive(Debug, PartialEq)]
enum Mode {
    Train,
    Eval,
}

#[derive(Debug, PartialEq)]
struct Run {
    mode: Mode,
    rate: f64,
}

impl Derive for Run {
    fn class_spec() -> ClassSpec {
        let mode = EnumType::new("Mode").member("train", 1).member("eval", 2);
        ClassSpec::new("Run")
            .param(Param::new("mode").annotated(Annotation::Descriptor(mode.into_descriptor())).default("train"))
            .param(Param::new("rate").annotated(Annotation::Float).default(1))
    }

    fn construct(args: &mut Arguments) -> ConstructResult<Self> {
        let mode: String = args.value("mode")?;
        let mode = match mode.as_str() {
            "train" => Mode::Train,
            "eval" => Mode::Eval,
            other => return Err(ConstructError::at("mode", format!("unexpected mode {other}"))),
        };
        Ok(Run { mode, rate: args.value("rate")? })
    }
}

fn field_table(descriptor: &shapecast::TypeDescriptor) -> Vec<(String, String)> {
    descriptor
        .as_struct()
        .unwrap()
        .fields()
        .map(|(name, field)| (name.clone(), field.to_string()))
        .collect()
}

#[test]
fn test_nested_class_is_derived_recursively() {
    let desc = derive::<Dog>().unwrap();
    assert_eq!(
        field_table(&desc),
        vec![
            ("name".to_string(), "Str".to_string()),
            ("owner".to_string(), "Owner".to_string()),
            ("tricks".to_string(), "List[Trick].empty".to_string()),
        ]
    );

    let raw = json::from_str(r#"{"name": "Rex", "owner": {"name": "Ann"}}"#).unwrap();
    let dog: Dog = from_target(&raw, Target::JsonSafe).unwrap();
    assert_eq!(dog.owner, Owner { name: "Ann".into() });
    assert!(dog.tricks.is_empty());
}

#[test]
fn test_underivable_nested_class_is_unresolvable() {
    let err = derive::<Kennel>().unwrap_err();
    assert!(matches!(err, Error::UnresolvableFieldType { .. }));
    assert!(err.is_derivation_error());
}

#[test]
fn test_derivation_is_deterministic() {
    let cache = DerivationCache::new();
    let first = cache.derive::<Dog>().unwrap();
    let second = DerivationCache::new().derive::<Dog>().unwrap();
    assert_eq!(field_table(&first), field_table(&second));
    assert_eq!(cache.derive::<Dog>().unwrap(), first);
}

#[test]
fn test_overrides_produce_a_separate_descriptor() {
    let plain = derive::<Module>().unwrap();
    let deep = derive_with::<Module>(&Overrides::new().value("layers", 96)).unwrap();

    assert_eq!(plain.as_struct().unwrap().get("layers").unwrap().to_string(), "Int.default(42)");
    assert_eq!(deep.as_struct().unwrap().get("layers").unwrap().to_string(), "Int.default(96)");

    let module: Module = from_target(&json::from_str("{}").unwrap(), Target::JsonSafe).unwrap();
    assert_eq!(module, Module { layers: 42, activation: "relu".into() });
}

#[test]
fn test_materialize_after_editing_values() {
    let desc = derive::<Dog>().unwrap();
    let st = desc.as_struct().unwrap();
    let raw = json::from_str(r#"{"name": "Rex", "owner": {"name": "Ann"}}"#).unwrap();
    let mut value = st.parse(&raw, Target::JsonSafe).unwrap();

    let trick = shapecast::StructValue::new().with("name", "roll").with("difficulty", 3);
    value.get_mut("tricks").and_then(Value::as_list_mut).unwrap().push(trick.into());

    let dog: Dog = materialize(&value).unwrap();
    assert_eq!(dog.tricks, vec![Trick { name: "roll".into(), difficulty: 3 }]);
}

#[test]
fn test_constructor_failure_is_materialize_error() {
    let raw = json::from_str(r#"{"name": " ", "owner": {"name": "Ann"}}"#).unwrap();
    let err = from_target::<Dog>(&raw, Target::JsonSafe).unwrap_err();
    assert!(matches!(err, Error::MaterializeError { .. }));
    assert_eq!(err.path().to_string(), "name");
}

#[test]
fn test_command_line_materializes_nested_field() {
    let parser = CliParser::for_class::<Trainer>().unwrap();
    let trainer = match parser.parse_args::<Trainer, _, _>(["module.layers=32", "verbose"]).unwrap() {
        CliOutcome::Parsed(trainer) => trainer,
        CliOutcome::Help(text) => panic!("unexpected help: {text}"),
    };
    assert_eq!(trainer.module, Module { layers: 32, activation: "relu".into() });
    assert_eq!(trainer.epochs, 10);
    assert!(trainer.verbose);
}

#[test]
fn test_command_line_rejects_other_classes() {
    let parser = CliParser::for_class::<Trainer>().unwrap();
    let err = parser.parse_args::<Module, _, _>(["layers=1"]).unwrap_err();
    assert!(matches!(err, Error::MaterializeError { .. }));
}

#[test]
fn test_snapshot_restores_equivalent_schema() {
    let desc = derive::<Trainer>().unwrap();
    let snapshot = SchemaSnapshot::capture(&desc).unwrap();
    let text = snapshot.to_json_string().unwrap();
    let reloaded = SchemaSnapshot::from_json_str(&text).unwrap();
    assert_eq!(reloaded.fingerprint().unwrap(), snapshot.fingerprint().unwrap());

    let restored = reloaded.restore().unwrap();
    assert_eq!(field_table(&restored), field_table(&desc));

    let raw = json::from_str(r#"{"module": {"layers": 7}}"#).unwrap();
    let original = desc.as_struct().unwrap().parse(&raw, Target::JsonSafe).unwrap();
    let copy = restored.as_struct().unwrap().parse(&raw, Target::JsonSafe).unwrap();
    assert_eq!(original, copy);
    assert!(restored.as_struct().unwrap().class().is_none());
}

#[test]
fn test_envelope_reopens_through_registry() {
    let desc = derive::<Trainer>().unwrap();
    let st = desc.as_struct().unwrap();
    let value = st.parse(&json::from_str(r#"{"epochs": 3}"#).unwrap(), Target::JsonSafe).unwrap();

    let sealed = Envelope::seal(st, &value).unwrap().to_json_string().unwrap();
    let envelope = Envelope::from_json_str(&sealed).unwrap();

    let registry = SchemaRegistry::new();
    let err = envelope.open(&registry).unwrap_err();
    assert!(matches!(err, Error::UnregisteredStructure { .. }));

    registry.register(st.clone()).unwrap();
    let (reopened, reloaded) = envelope.open(&registry).unwrap();
    assert_eq!(reopened.name(), Some("Trainer"));
    assert_eq!(reloaded, value);

    let trainer: Trainer = materialize(&reloaded).unwrap();
    assert_eq!(trainer.epochs, 3);
}

#[test]
fn test_empty_without_empty_value_is_rejected_at_derivation() {
    let err = derive::<Sensor>().unwrap_err();
    assert!(matches!(err, Error::UnresolvableFieldType { .. }));
    assert_eq!(err.path().to_string(), "last.taken");
}

#[test]
fn test_enum_field_materializes_from_member_number() {
    let desc = derive::<Run>().unwrap();
    assert_eq!(
        field_table(&desc),
        vec![
            ("mode".to_string(), "Mode.default(\"train\")".to_string()),
            ("rate".to_string(), "Float.default(1.0)".to_string()),
        ]
    );

    let run: Run = from_target(&json::from_str(r#"{"mode": 2}"#).unwrap(), Target::JsonSafe).unwrap();
    assert_eq!(run, Run { mode: Mode::Eval, rate: 1.0 });

    let parser = CliParser::for_class::<Run>().unwrap();
    match parser.parse_args::<Run, _, _>(["mode=1", "rate=0.5"]).unwrap() {
        CliOutcome::Parsed(run) => assert_eq!(run, Run { mode: Mode::Train, rate: 0.5 }),
        CliOutcome::Help(text) => panic!("unexpected help: {text}"),
    }
}

#[test]
fn test_float_override_from_integer() {
    let desc = derive_with::<Run>(&Overrides::new().value("rate", 4)).unwrap();
    let rate = desc.as_struct().unwrap().get("rate").unwrap();
    assert_eq!(rate, &TypeDescriptor::float().default(4.0));
}
