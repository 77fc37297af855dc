//! Koinonia bootstrap binary
//!
//! Connects to MongoDB, applies collection indexes, and constructs the
//! relationship service and visibility resolver. Useful as a deployment
//! smoke check; the real entry point is the embedding request layer, which
//! wires these services into its handlers the same way.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use koinonia::{
    config::Args, db::MongoClient, logging, relationship::RelationshipService,
    visibility::VisibilityResolver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Koinonia - Relationship Engine");
    info!("  \"That they all may be one\"");
    info!("======================================");

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;

    let relationships = RelationshipService::new(mongo.clone()).await?;
    let _resolver = VisibilityResolver::new(Arc::new(relationships));

    info!(
        db = %args.mongodb_db,
        "indexes applied, services constructed, ready"
    );

    Ok(())
}
