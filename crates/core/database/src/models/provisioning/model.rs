use std::fmt;

use bson::Document;
use scheduling_config::{MongoEnvironment, OnExisting, Profile, Settings};
use scheduling_result::{ErrorType, Result};

use crate::{Availability, Database, Event, User};

pub static ROOT_USERNAME_VARIABLE: &str = "MONGO_INITDB_ROOT_USERNAME";
pub static ROOT_PASSWORD_VARIABLE: &str = "MONGO_INITDB_ROOT_PASSWORD";
pub static DATABASE_VARIABLE: &str = "MONGO_INITDB_DATABASE";

/// Root account used to authenticate against the administrative database
#[derive(Clone, PartialEq, Eq)]
pub struct RootCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RootCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> RootCredentials {
        RootCredentials {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read the root account from the container variables
    pub fn from_environment(environment: &MongoEnvironment) -> Result<RootCredentials> {
        let username = non_empty(&environment.initdb_root_username, ROOT_USERNAME_VARIABLE)?;
        let password = non_empty(&environment.initdb_root_password, ROOT_PASSWORD_VARIABLE)?;

        Ok(RootCredentials::new(username, password))
    }
}

fn non_empty<'a>(value: &'a Option<String>, variable: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            create_error!(MissingCredentials {
                variable: variable.to_string()
            })
        })
}

/// Database account granted access to the target database
#[derive(Clone, PartialEq, Eq)]
pub struct ApplicationUser {
    pub username: String,
    pub password: String,
    pub roles: Vec<String>,
}

impl fmt::Debug for ApplicationUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

impl ApplicationUser {
    /// The application reuses the root account's name and password
    pub fn from_root(credentials: &RootCredentials, roles: &[String]) -> ApplicationUser {
        ApplicationUser {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            roles: roles.to_vec(),
        }
    }
}

auto_derived!(
    /// Index over one or more ascending fields
    pub struct IndexDefinition {
        /// Collection the index belongs to
        pub collection: String,
        /// Index name
        pub name: String,
        /// Indexed fields, in key order
        pub fields: Vec<String>,
        /// Whether the index rejects duplicate keys
        pub unique: bool,
    }
);

impl IndexDefinition {
    pub fn new(collection: &str, name: &str, fields: &[&str], unique: bool) -> IndexDefinition {
        IndexDefinition {
            collection: collection.to_string(),
            name: name.to_string(),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            unique,
        }
    }

    /// Ascending index named the way the engine names it by default
    pub fn ascending(collection: &str, fields: &[&str], unique: bool) -> IndexDefinition {
        let name = fields
            .iter()
            .map(|field| format!("{field}_1"))
            .collect::<Vec<_>>()
            .join("_");

        IndexDefinition::new(collection, &name, fields, unique)
    }

    /// Key specification
    pub fn key(&self) -> Document {
        let mut key = Document::new();
        for field in &self.fields {
            key.insert(field, 1_i32);
        }

        key
    }

    /// Entry for a `createIndexes` command
    pub fn to_document(&self) -> Document {
        doc! {
            "key": self.key(),
            "name": self.name.clone(),
            "unique": self.unique
        }
    }

    /// Same keys and options, ignoring the name
    pub fn same_shape(&self, other: &IndexDefinition) -> bool {
        self.collection == other.collection
            && self.fields == other.fields
            && self.unique == other.unique
    }

    /// `collection.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.collection, self.name)
    }
}

/// Collections and indexes the application expects to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blueprint {
    pub collections: Vec<String>,
    pub indexes: Vec<IndexDefinition>,
}

impl Blueprint {
    /// Events, users and availability
    pub fn scheduling() -> Blueprint {
        Blueprint {
            collections: vec![
                Event::COLLECTION.to_string(),
                User::COLLECTION.to_string(),
                Availability::COLLECTION.to_string(),
            ],
            indexes: vec![Event::index(), User::index(), Availability::index()],
        }
    }

    /// List everything in the blueprint that the database lacks
    pub async fn verify(&self, db: &Database) -> Result<Vec<String>> {
        let collections = db.list_collections().await?;

        let mut missing: Vec<String> = self
            .collections
            .iter()
            .filter(|collection| !collections.contains(collection))
            .cloned()
            .collect();

        for index in &self.indexes {
            let existing = db.list_indexes(&index.collection).await?;
            if !existing
                .iter()
                .any(|other| other.name == index.name && other.same_shape(index))
            {
                missing.push(index.qualified_name());
            }
        }

        Ok(missing)
    }
}

/// Outcome of a provisioning run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Target database
    pub database: String,
    /// Application user that was created
    pub user: Option<String>,
    /// Collections that were created
    pub collections: Vec<String>,
    /// Indexes that were created or already matched
    pub indexes: Vec<String>,
    /// Resources left alone because they already existed
    pub skipped: Vec<String>,
}

/// Everything needed to bootstrap one database
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub profile: Profile,
    /// Administrative database used for authentication
    pub admin_database: String,
    /// Root account, required by the provisioning profile
    pub credentials: Option<RootCredentials>,
    /// Target application database
    pub database: String,
    /// Roles granted to the application user
    pub roles: Vec<String>,
    pub on_existing: OnExisting,
    pub blueprint: Blueprint,
}

impl ProvisionPlan {
    /// Derive the plan from configuration and the container variables
    ///
    /// The provisioning profile takes the database from `MONGO_INITDB_DATABASE`,
    /// the preauthenticated profile from `bootstrap.database`.
    pub fn resolve(settings: &Settings, environment: &MongoEnvironment) -> Result<ProvisionPlan> {
        let (credentials, database) = match settings.bootstrap.profile {
            Profile::Provisioning => {
                let credentials = RootCredentials::from_environment(environment)?;
                let database = environment
                    .initdb_database
                    .clone()
                    .filter(|database| !database.is_empty())
                    .ok_or_else(|| {
                        create_error!(InvalidConfiguration {
                            error: format!("`{DATABASE_VARIABLE}` is not set")
                        })
                    })?;

                (Some(credentials), database)
            }
            Profile::Preauthenticated => (None, settings.bootstrap.database.clone()),
        };

        Ok(ProvisionPlan {
            profile: settings.bootstrap.profile,
            admin_database: settings.database.admin.clone(),
            credentials,
            database,
            roles: settings.bootstrap.roles.clone(),
            on_existing: settings.bootstrap.on_existing,
            blueprint: Blueprint::scheduling(),
        })
    }

    /// Authenticate if the profile requires it and switch to the target database
    pub async fn open(&self, db: &Database) -> Result<Database> {
        if self.database.is_empty() {
            return Err(create_error!(InvalidConfiguration {
                error: "target database name is empty".to_string()
            }));
        }

        let db = match self.profile {
            Profile::Provisioning => {
                let credentials = self.credentials.as_ref().ok_or_else(|| {
                    create_error!(MissingCredentials {
                        variable: ROOT_USERNAME_VARIABLE.to_string()
                    })
                })?;

                info!(
                    "Authenticating as `{}` against `{}`.",
                    credentials.username, self.admin_database
                );
                db.authenticate(&self.admin_database, credentials).await?
            }
            Profile::Preauthenticated => db.clone(),
        };

        info!("Switching to database `{}`.", self.database);
        Ok(db.select_database(&self.database))
    }

    /// Create the user, collections and indexes, stopping at the first failure
    pub async fn apply(&self, db: &Database) -> Result<ProvisionReport> {
        let skip = self.on_existing == OnExisting::Skip;
        let mut report = ProvisionReport {
            database: self.database.clone(),
            ..Default::default()
        };

        if let (Profile::Provisioning, Some(credentials)) = (self.profile, &self.credentials) {
            let user = ApplicationUser::from_root(credentials, &self.roles);
            if skip && db.user_exists(&user.username).await? {
                warn!("User `{}` already exists, skipping.", user.username);
                report.skipped.push(format!("user:{}", user.username));
            } else {
                info!(
                    "Creating user `{}` with roles {:?}.",
                    user.username, user.roles
                );
                db.create_user(&user).await?;
                report.user = Some(user.username);
            }
        }

        let existing = if skip {
            db.list_collections().await?
        } else {
            vec![]
        };

        for collection in &self.blueprint.collections {
            if existing.contains(collection) {
                warn!("Collection `{collection}` already exists, skipping.");
                report.skipped.push(format!("collection:{collection}"));
                continue;
            }

            info!("Creating `{collection}` collection.");
            db.create_collection(collection).await?;
            report.collections.push(collection.clone());
        }

        for index in &self.blueprint.indexes {
            info!(
                "Creating index `{}` on `{}` (unique: {}).",
                index.name, index.collection, index.unique
            );
            db.create_index(index).await?;
            report.indexes.push(index.qualified_name());
        }

        info!("Provisioned database `{}`.", self.database);
        Ok(report)
    }

    /// Run the whole routine against a fresh connection
    pub async fn execute(&self, db: &Database) -> Result<ProvisionReport> {
        let target = self.open(db).await?;
        self.apply(&target).await
    }

    /// Fail unless every collection and index in the blueprint exists
    pub async fn verify(&self, db: &Database) -> Result<()> {
        let missing = self.blueprint.verify(db).await?;
        if missing.is_empty() {
            info!("Verified database `{}`.", self.database);
            Ok(())
        } else {
            Err(create_error!(VerificationFailed { missing }))
        }
    }
}

/// Whether the error means a resource was already provisioned
pub fn is_duplicate_resource(error: &scheduling_result::Error) -> bool {
    matches!(
        error.error_type,
        ErrorType::DuplicateUser { .. }
            | ErrorType::DuplicateCollection { .. }
            | ErrorType::IndexConflict { .. }
    )
}

#[cfg(test)]
mod tests {
    use scheduling_config::{builder, MongoEnvironment, OnExisting, Profile, Settings};
    use scheduling_result::ErrorType;

    use crate::{
        test_credentials, Availability, Blueprint, Database, Event, IndexDefinition,
        ProvisionPlan, ReferenceDb, RootCredentials, User,
    };

    fn plan(db: &Database, profile: Profile, on_existing: OnExisting) -> ProvisionPlan {
        ProvisionPlan {
            profile,
            admin_database: "admin".to_string(),
            credentials: Some(test_credentials()),
            database: db.database_name().to_string(),
            roles: vec!["readWrite".to_string(), "dbAdmin".to_string()],
            on_existing,
            blueprint: Blueprint::scheduling(),
        }
    }

    async fn authenticated(db: &Database) -> Database {
        db.authenticate("admin", &test_credentials())
            .await
            .expect("test credentials")
            .select_database(db.database_name())
    }

    fn environment(pairs: &[(&str, &str)]) -> MongoEnvironment {
        MongoEnvironment::from_source(Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
        .unwrap()
    }

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let config = builder(Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
        .build()
        .unwrap();

        Settings::from_config(config, &MongoEnvironment::default()).unwrap()
    }

    #[test]
    fn blueprint_matches_data_model() {
        let blueprint = Blueprint::scheduling();
        assert_eq!(blueprint.collections, vec!["events", "users", "availability"]);
        assert_eq!(
            blueprint.indexes,
            vec![
                IndexDefinition::new("events", "eventId_1", &["eventId"], true),
                IndexDefinition::new("users", "userId_1", &["userId"], true),
                IndexDefinition::new(
                    "availability",
                    "userId_1_eventId_1",
                    &["userId", "eventId"],
                    false
                ),
            ]
        );
        assert_eq!(
            blueprint.indexes[2].to_document(),
            doc! {
                "key": { "userId": 1_i32, "eventId": 1_i32 },
                "name": "userId_1_eventId_1",
                "unique": false
            }
        );
    }

    #[test]
    fn resolve_reads_container_variables() {
        let plan = ProvisionPlan::resolve(
            &settings(&[]),
            &environment(&[
                ("MONGO_INITDB_ROOT_USERNAME", "root"),
                ("MONGO_INITDB_ROOT_PASSWORD", "secret"),
                ("MONGO_INITDB_DATABASE", "events_app"),
            ]),
        )
        .unwrap();

        assert_eq!(plan.profile, Profile::Provisioning);
        assert_eq!(plan.database, "events_app");
        assert_eq!(plan.admin_database, "admin");
        assert_eq!(plan.credentials, Some(RootCredentials::new("root", "secret")));
        assert!(!format!("{plan:?}").contains("secret"));
    }

    #[test]
    fn resolve_requires_credentials() {
        let error = ProvisionPlan::resolve(
            &settings(&[]),
            &environment(&[("MONGO_INITDB_DATABASE", "events_app")]),
        )
        .unwrap_err();
        assert_eq!(
            error.error_type,
            ErrorType::MissingCredentials {
                variable: "MONGO_INITDB_ROOT_USERNAME".to_string()
            }
        );

        let error = ProvisionPlan::resolve(
            &settings(&[]),
            &environment(&[
                ("MONGO_INITDB_ROOT_USERNAME", "root"),
                ("MONGO_INITDB_ROOT_PASSWORD", ""),
                ("MONGO_INITDB_DATABASE", "events_app"),
            ]),
        )
        .unwrap_err();
        assert_eq!(
            error.error_type,
            ErrorType::MissingCredentials {
                variable: "MONGO_INITDB_ROOT_PASSWORD".to_string()
            }
        );
    }

    #[test]
    fn resolve_requires_target_database() {
        let error = ProvisionPlan::resolve(
            &settings(&[]),
            &environment(&[
                ("MONGO_INITDB_ROOT_USERNAME", "root"),
                ("MONGO_INITDB_ROOT_PASSWORD", "secret"),
            ]),
        )
        .unwrap_err();

        assert!(matches!(
            error.error_type,
            ErrorType::InvalidConfiguration { .. }
        ));
    }

    #[test]
    fn preauthenticated_profile_uses_configured_database() {
        let plan = ProvisionPlan::resolve(
            &settings(&[("SCHEDULING__BOOTSTRAP__PROFILE", "preauthenticated")]),
            &environment(&[("MONGO_INITDB_DATABASE", "ignored")]),
        )
        .unwrap();

        assert_eq!(plan.profile, Profile::Preauthenticated);
        assert_eq!(plan.database, "scheduling-app");
        assert!(plan.credentials.is_none());
    }

    #[tokio::test]
    async fn provisions_fresh_database() {
        database_test!(|db| async move {
            let report = plan(&db, Profile::Provisioning, OnExisting::Fail)
                .execute(&db)
                .await
                .unwrap();

            assert_eq!(report.user, Some(test_credentials().username));
            assert_eq!(report.collections, vec!["events", "users", "availability"]);
            assert_eq!(
                report.indexes,
                vec![
                    "events.eventId_1",
                    "users.userId_1",
                    "availability.userId_1_eventId_1"
                ]
            );
            assert!(report.skipped.is_empty());

            let target = authenticated(&db).await;
            let mut collections = target.list_collections().await.unwrap();
            collections.sort();
            assert_eq!(collections, vec!["availability", "events", "users"]);
            assert!(Blueprint::scheduling()
                .verify(&target)
                .await
                .unwrap()
                .is_empty());
            assert!(target
                .user_exists(&test_credentials().username)
                .await
                .unwrap());
        });
    }

    #[tokio::test]
    async fn event_ids_are_unique() {
        database_test!(|db| async move {
            plan(&db, Profile::Provisioning, OnExisting::Fail)
                .execute(&db)
                .await
                .unwrap();

            let target = authenticated(&db).await;
            let event = Event {
                event_id: "launch".to_string(),
            };

            event.create(&target).await.unwrap();
            let error = event.create(&target).await.unwrap_err();
            assert_eq!(
                error.error_type,
                ErrorType::DuplicateKey {
                    collection: "events".to_string(),
                    index: "eventId_1".to_string()
                }
            );
        });
    }

    #[tokio::test]
    async fn user_ids_are_unique() {
        database_test!(|db| async move {
            plan(&db, Profile::Provisioning, OnExisting::Fail)
                .execute(&db)
                .await
                .unwrap();

            let target = authenticated(&db).await;
            User {
                user_id: "alice".to_string(),
            }
            .create(&target)
            .await
            .unwrap();

            User {
                user_id: "bob".to_string(),
            }
            .create(&target)
            .await
            .unwrap();

            let error = User {
                user_id: "alice".to_string(),
            }
            .create(&target)
            .await
            .unwrap_err();

            assert_eq!(
                error.error_type,
                ErrorType::DuplicateKey {
                    collection: "users".to_string(),
                    index: "userId_1".to_string()
                }
            );
        });
    }

    #[tokio::test]
    async fn availability_pairs_may_repeat() {
        database_test!(|db| async move {
            plan(&db, Profile::Provisioning, OnExisting::Fail)
                .execute(&db)
                .await
                .unwrap();

            let target = authenticated(&db).await;
            let availability = Availability {
                user_id: "alice".to_string(),
                event_id: "launch".to_string(),
            };

            availability.create(&target).await.unwrap();
            availability.create(&target).await.unwrap();

            assert_eq!(
                target
                    .count_documents(
                        "availability",
                        doc! { "userId": "alice", "eventId": "launch" }
                    )
                    .await
                    .unwrap(),
                2
            );
        });
    }

    #[tokio::test]
    async fn rerun_fails_at_user_creation() {
        database_test!(|db| async move {
            let plan = plan(&db, Profile::Provisioning, OnExisting::Fail);
            plan.execute(&db).await.unwrap();

            let error = plan.execute(&db).await.unwrap_err();
            assert_eq!(
                error.error_type,
                ErrorType::DuplicateUser {
                    user: test_credentials().username
                }
            );
            assert!(crate::is_duplicate_resource(&error));
        });
    }

    #[tokio::test]
    async fn preauthenticated_rerun_fails_at_first_collection() {
        database_test!(|db| async move {
            let target = authenticated(&db).await;
            let plan = plan(&db, Profile::Preauthenticated, OnExisting::Fail);

            let report = plan.execute(&target).await.unwrap();
            assert_eq!(report.user, None);

            let error = plan.execute(&target).await.unwrap_err();
            assert_eq!(
                error.error_type,
                ErrorType::DuplicateCollection {
                    collection: "events".to_string()
                }
            );
        });
    }

    #[tokio::test]
    async fn rerun_with_skip_is_a_no_op() {
        database_test!(|db| async move {
            let plan = plan(&db, Profile::Provisioning, OnExisting::Skip);
            plan.execute(&db).await.unwrap();

            let report = plan.execute(&db).await.unwrap();
            assert_eq!(report.user, None);
            assert!(report.collections.is_empty());
            assert_eq!(report.indexes.len(), 3);
            assert_eq!(
                report.skipped,
                vec![
                    format!("user:{}", test_credentials().username),
                    "collection:events".to_string(),
                    "collection:users".to_string(),
                    "collection:availability".to_string(),
                ]
            );

            plan.verify(&authenticated(&db).await).await.unwrap();
        });
    }

    #[tokio::test]
    async fn conflicting_index_aborts() {
        database_test!(|db| async move {
            let target = authenticated(&db).await;
            target
                .create_index(&IndexDefinition::new(
                    "events",
                    "eventId_1",
                    &["eventId"],
                    false,
                ))
                .await
                .unwrap();

            let error = plan(&db, Profile::Provisioning, OnExisting::Skip)
                .execute(&db)
                .await
                .unwrap_err();

            assert_eq!(
                error.error_type,
                ErrorType::IndexConflict {
                    collection: "events".to_string(),
                    index: "eventId_1".to_string()
                }
            );
        });
    }

    #[tokio::test]
    async fn invalid_credentials_create_nothing() {
        database_test!(|db| async move {
            let mut plan = plan(&db, Profile::Provisioning, OnExisting::Fail);
            plan.credentials = Some(RootCredentials::new(
                test_credentials().username,
                "definitely-not-the-password",
            ));

            let error = plan.execute(&db).await.unwrap_err();
            assert_eq!(error.error_type, ErrorType::InvalidCredentials);

            let target = authenticated(&db).await;
            assert!(target.list_collections().await.unwrap().is_empty());
            assert!(!target
                .user_exists(&test_credentials().username)
                .await
                .unwrap());
        });
    }

    #[tokio::test]
    async fn verification_reports_missing_resources() {
        database_test!(|db| async move {
            let target = authenticated(&db).await;
            target.create_collection("events").await.unwrap();

            let plan = plan(&db, Profile::Preauthenticated, OnExisting::Fail);
            let error = plan.verify(&target).await.unwrap_err();
            assert_eq!(
                error.error_type,
                ErrorType::VerificationFailed {
                    missing: vec![
                        "users".to_string(),
                        "availability".to_string(),
                        "events.eventId_1".to_string(),
                        "users.userId_1".to_string(),
                        "availability.userId_1_eventId_1".to_string(),
                    ]
                }
            );
        });
    }

    #[tokio::test]
    async fn empty_target_database_is_rejected() {
        let db = Database::Reference(ReferenceDb::with_root("admin", &test_credentials()));
        let mut plan = plan(&db, Profile::Provisioning, OnExisting::Fail);
        plan.database = String::new();

        let error = plan.execute(&db).await.unwrap_err();
        assert!(matches!(
            error.error_type,
            ErrorType::InvalidConfiguration { .. }
        ));
    }

    #[tokio::test]
    async fn anonymous_administration_is_rejected() {
        let db = Database::Reference(
            ReferenceDb::with_root("admin", &test_credentials()).in_database("scheduling-app"),
        );

        let error = plan(&db, Profile::Preauthenticated, OnExisting::Fail)
            .execute(&db)
            .await
            .unwrap_err();
        assert_eq!(error.error_type, ErrorType::Unauthorized);
    }

    #[tokio::test]
    async fn engine_without_accounts_rejects_authentication() {
        let db = Database::Reference(ReferenceDb::default());
        let error = plan(&db, Profile::Provisioning, OnExisting::Fail)
            .execute(&db)
            .await
            .unwrap_err();

        assert_eq!(error.error_type, ErrorType::InvalidCredentials);
    }
}
