use scheduling_config::{config, MongoEnvironment};
use scheduling_database::{DatabaseInfo, ProvisionPlan};

#[tokio::main]
async fn main() {
    let settings = config().await.unwrap();
    let environment = MongoEnvironment::from_env().unwrap();
    let plan = ProvisionPlan::resolve(&settings, &environment).unwrap();

    let db = DatabaseInfo::Auto.connect().await.unwrap();
    let report = plan.execute(&db).await.unwrap();
    println!("{report:#?}");
}
