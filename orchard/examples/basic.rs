//! Basic example of Orchard DI.

use orchard::prelude::*;
use std::sync::Arc;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

// Self-declared: nobody binds it, components that need it get it anyway.
impl Injectable for UserRepository {
    fn dependencies() -> Vec<Dep> {
        vec![Dep::from(Key::of::<Database>())]
    }

    fn inject(args: &Args<'_>) -> Result<Self> {
        Ok(UserRepository {
            db: args.get(TypedKey::new())?,
        })
    }
}

orchard::injectable!(UserRepository);

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

/// Audit sinks contributed by several components.
struct AuditSink(&'static str);

// === Components ===

fn logging_component() -> Component {
    Component::builder()
        .register_constructor(TypedKey::<ConsoleLogger>::new(), [], |_| Ok(ConsoleLogger))
        .bind_interface(
            TypedKey::<dyn Logger>::new(),
            TypedKey::<ConsoleLogger>::new(),
            |logger| logger as Arc<dyn Logger>,
        )
        .add_instance_multibinding(TypedKey::new(), Arc::new(AuditSink("stdout")))
        .build(Signature::provides([Key::of::<dyn Logger>()]).expect("valid signature"))
}

fn database_component() -> Component {
    Component::builder()
        .install(logging_component)
        .register_constructor(
            TypedKey::<Database>::new(),
            [Dep::from(Key::of::<Config>()), Dep::from(Key::of::<dyn Logger>())],
            |args| {
                let config: Arc<Config> = args.get(TypedKey::new())?;
                Ok(Database {
                    url: config.database_url.clone(),
                    logger: args.get(TypedKey::new())?,
                })
            },
        )
        .build(
            Signature::new([Key::of::<Config>()], [Key::of::<Database>()])
                .expect("valid signature"),
        )
}

fn service_component() -> Component {
    Component::builder()
        .install(database_component)
        // Installed twice across the graph; expanded once.
        .install(logging_component)
        .register_constructor(
            TypedKey::<UserService>::new(),
            [
                Dep::from(Key::of::<UserRepository>()),
                Dep::from(Key::of::<dyn Logger>()),
            ],
            |args| {
                Ok(UserService {
                    repo: args.get(TypedKey::new())?,
                    logger: args.get(TypedKey::new())?,
                })
            },
        )
        .add_instance_multibinding(TypedKey::new(), Arc::new(AuditSink("file")))
        .build(
            Signature::new([Key::of::<Config>()], [Key::of::<UserService>()])
                .expect("valid signature"),
        )
}

fn config_component(debug: bool) -> Component {
    Component::builder()
        .bind_instance(
            TypedKey::new(),
            Arc::new(Config {
                database_url: "postgres://localhost/myapp".to_string(),
                debug,
            }),
        )
        .build(Signature::provides([Key::of::<Config>()]).expect("valid signature"))
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("orchard_container=debug")
        .init();

    // Validate the service graph once
    let normalized = NormalizedComponent::new(service_component())?;
    println!("✅ Normalized component built: {normalized:?}");

    // === One injector per configuration, sharing the validated graph ===
    for debug in [true, false] {
        let injector = Injector::builder()
            .normalized(&normalized)
            .component(config_component(debug))
            .build()?;

        let config: Arc<Config> = injector.get()?;
        println!("📋 Config: database_url={}, debug={}", config.database_url, config.debug);

        let service: Arc<UserService> = injector.get()?;
        println!("👤 {}", service.get_user(42));

        let sinks = injector.get_multibindings(TypedKey::<AuditSink>::new())?;
        let names: Vec<&str> = sinks.iter().map(|sink| sink.0).collect();
        println!("📝 Audit sinks: {}", names.join(", "));

        injector.shutdown();
    }

    println!("\n🎉 Everything works!");
    Ok(())
}
