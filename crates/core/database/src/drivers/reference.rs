use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bson::{oid::ObjectId, Bson, Document};
use futures::lock::Mutex;
use scheduling_result::Result;

use crate::{IndexDefinition, RootCredentials};

/// Account known to the reference engine
#[derive(Clone, Debug)]
pub struct ReferenceAccount {
    pub password: String,
    pub roles: Vec<String>,
}

/// Collection held in memory
#[derive(Clone, Debug)]
pub struct ReferenceCollection {
    pub indexes: Vec<IndexDefinition>,
    pub documents: Vec<Document>,
}

impl ReferenceCollection {
    /// Every collection starts with the implicit `_id_` index
    pub fn new(name: &str) -> ReferenceCollection {
        ReferenceCollection {
            indexes: vec![IndexDefinition::new(name, "_id_", &["_id"], true)],
            documents: vec![],
        }
    }

    /// Find the first unique index the document would violate
    pub fn violated_index(&self, document: &Document) -> Option<&IndexDefinition> {
        self.indexes.iter().filter(|index| index.unique).find(|index| {
            let key = index_key(index, document);
            self.documents
                .iter()
                .any(|existing| index_key(index, existing) == key)
        })
    }

    /// Whether existing documents already collide on the given index
    pub fn has_duplicates(&self, index: &IndexDefinition) -> bool {
        let mut keys: Vec<Vec<Bson>> = vec![];
        for document in &self.documents {
            let key = index_key(index, document);
            if keys.contains(&key) {
                return true;
            }

            keys.push(key);
        }

        false
    }

    /// Insert a document, generating `_id` when it is absent
    pub fn insert(&mut self, mut document: Document) -> Result<(), IndexDefinition> {
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }

        if let Some(index) = self.violated_index(&document) {
            return Err(index.clone());
        }

        self.documents.push(document);
        Ok(())
    }
}

/// Missing fields are indexed as null
fn index_key(index: &IndexDefinition, document: &Document) -> Vec<Bson> {
    index
        .fields
        .iter()
        .map(|field| document.get(field).map(canonical).unwrap_or(Bson::Null))
        .collect()
}

/// Numbers compare by value regardless of their width
fn canonical(value: &Bson) -> Bson {
    match value {
        Bson::Int32(number) => Bson::Int64(i64::from(*number)),
        Bson::Double(number)
            if number.fract() == 0.0 && number.abs() < i64::MAX as f64 =>
        {
            Bson::Int64(*number as i64)
        }
        value => value.clone(),
    }
}

/// Logical database held in memory
#[derive(Clone, Debug, Default)]
pub struct ReferenceDatabase {
    pub collections: BTreeMap<String, ReferenceCollection>,
}

impl ReferenceDatabase {
    /// Get a collection, creating it implicitly like the real engine does
    pub fn collection_mut(&mut self, name: &str) -> &mut ReferenceCollection {
        self.collections
            .entry(name.to_string())
            .or_insert_with(|| ReferenceCollection::new(name))
    }
}

/// Shared engine state
#[derive(Debug, Default)]
pub struct ReferenceState {
    /// Accounts keyed by (database, username)
    pub accounts: HashMap<(String, String), ReferenceAccount>,
    pub databases: HashMap<String, ReferenceDatabase>,
    /// Database holding root accounts, access control is on when set
    pub admin: Option<String>,
}

impl ReferenceState {
    pub fn access_control(&self) -> bool {
        self.admin.is_some()
    }
}

database_derived!(
    /// Reference implementation
    pub struct ReferenceDb {
        pub state: Arc<Mutex<ReferenceState>>,
        pub database: String,
        pub principal: Option<String>,
    }
);

impl Default for ReferenceDb {
    fn default() -> Self {
        ReferenceDb {
            state: Default::default(),
            database: "test".to_string(),
            principal: None,
        }
    }
}

impl ReferenceDb {
    /// Create an engine with access control and a single root account
    pub fn with_root(admin: &str, credentials: &RootCredentials) -> ReferenceDb {
        let mut state = ReferenceState {
            admin: Some(admin.to_string()),
            ..Default::default()
        };

        state.accounts.insert(
            (admin.to_string(), credentials.username.clone()),
            ReferenceAccount {
                password: credentials.password.clone(),
                roles: vec!["root".to_string()],
            },
        );

        ReferenceDb {
            state: Arc::new(Mutex::new(state)),
            database: admin.to_string(),
            principal: None,
        }
    }

    /// Reject anonymous handles once access control is on
    pub fn authorize(&self, state: &ReferenceState) -> Result<()> {
        if state.access_control() && self.principal.is_none() {
            Err(create_error!(Unauthorized))
        } else {
            Ok(())
        }
    }

    /// Same engine, different database context
    pub fn in_database(self, database: impl Into<String>) -> ReferenceDb {
        ReferenceDb {
            database: database.into(),
            ..self
        }
    }
}
