//! Service configuration from environment variables.

use std::net::IpAddr;

/// Runtime settings for the sync service.
#[derive(Debug, Clone)]
pub struct Config {
  /// Postgres connection string.
  pub database_url: String,
  /// Address the HTTP listener binds to. Internal by default; put a proxy
  /// in front for external webhook delivery.
  pub bind_addr: IpAddr,
  pub port: u16,
  /// Actor recorded in the inserted_by / updated_by audit columns.
  pub audit_actor: String,
}

impl Config {
  pub fn from_env() -> Self {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let bind_addr: IpAddr = std::env::var("BIND_ADDR")
      .unwrap_or_else(|_| "127.0.0.1".into())
      .parse()
      .expect("BIND_ADDR must be a valid IP address");
    let port: u16 = std::env::var("PORT")
      .unwrap_or_else(|_| "5005".into())
      .parse()
      .expect("PORT must be a valid u16");
    let audit_actor =
      std::env::var("AUDIT_ACTOR").unwrap_or_else(|_| "warehouse-sync".into());

    Self {
      database_url,
      bind_addr,
      port,
      audit_actor,
    }
  }
}
