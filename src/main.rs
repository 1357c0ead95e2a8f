//! sslbot command line interface

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use openssl::rand::rand_bytes;

use sslbot_core::acme::certbot::CertbotAcmeClient;
use sslbot_core::acme::lego::LegoAcmeClient;
use sslbot_core::acme::AcmeClient;
use sslbot_core::certmanager::{
    AssignRequest, CertNameRequest, CertificateManager, CommonDirChangeRequest, IssueRequest,
    UploadRequest,
};
use sslbot_core::common::{init_logger, CoreError, Result};
use sslbot_core::config::AppConfig;
use sslbot_core::storage::certbot::CertbotStorage;
use sslbot_core::storage::default::DefaultStorage;
use sslbot_core::storage::lego::LegoStorage;
use sslbot_core::storage::StorageRegistry;

#[derive(Parser)]
#[command(name = "sslbot", version, about = "Transactional TLS certificate automation for Nginx/Apache")]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a certificate via ACME and optionally deploy it.
    IssueCert {
        #[arg(short = 'd', long)]
        domain: String,
        #[arg(short = 'e', long)]
        email: String,
        #[arg(short = 'w', long, default_value = "nginx")]
        web_server: String,
        /// Additional subject alternative names beyond `domain`.
        #[arg(short = 'a', long = "alt-name")]
        subjects: Vec<String>,
        /// Deploy and reload the matching virtual host after issuance.
        #[arg(long, default_value_t = true)]
        assign: bool,
        /// Skip the daemon reload step after deploying.
        #[arg(long, default_value_t = false)]
        prevent_reload: bool,
    },
    /// Deploy an already-issued certificate and key file to a virtual host.
    DeployCert {
        #[arg(short = 'd', long)]
        domain: String,
        #[arg(short = 'w', long, default_value = "nginx")]
        web_server: String,
        #[arg(short = 'n', long)]
        cert_name: String,
        #[arg(short = 'c', long)]
        cert_file: PathBuf,
        #[arg(short = 'k', long)]
        key_file: PathBuf,
    },
    /// Assign a certificate already present in a storage to a virtual host.
    AssignCert {
        #[arg(short = 'd', long)]
        domain: String,
        #[arg(short = 'w', long, default_value = "nginx")]
        web_server: String,
        #[arg(short = 'n', long)]
        cert_name: String,
        #[arg(short = 's', long, default_value = "default")]
        storage_type: String,
    },
    /// List certificates held by a storage.
    ListCerts {
        #[arg(short = 's', long, default_value = "default")]
        storage_type: String,
    },
    /// Show details of one stored certificate.
    CertInfo {
        #[arg(short = 'n', long)]
        cert_name: String,
        #[arg(short = 's', long, default_value = "default")]
        storage_type: String,
    },
    /// Remove a certificate from a storage.
    RemoveCert {
        #[arg(short = 'n', long)]
        cert_name: String,
        #[arg(short = 's', long, default_value = "default")]
        storage_type: String,
    },
    /// Query or change the ACME HTTP-01 common directory for a host.
    CommonDir {
        #[arg(short = 'd', long)]
        domain: String,
        #[arg(short = 'w', long, default_value = "nginx")]
        web_server: String,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long, conflicts_with = "enable")]
        disable: bool,
    },
    /// Print a freshly generated shared secret for the request dispatcher.
    GenerateToken,
    /// Load and validate configuration, then idle until interrupted.
    Serve,
}

fn build_manager(config: &AppConfig) -> Result<CertificateManager> {
    let acme_client: Box<dyn AcmeClient> = if config.certbot_enabled {
        Box::new(CertbotAcmeClient::new(
            config.certbot_bin.clone(),
            config.certbot_work_dir.clone(),
        ))
    } else {
        Box::new(LegoAcmeClient::new(
            "lego".to_string(),
            config.ca_server.clone(),
            config.var_dir.clone(),
        ))
    };

    let mut storages: Vec<Box<dyn sslbot_core::storage::CertStorage>> =
        vec![Box::new(DefaultStorage::new(&config.var_dir))];
    if config.certbot_enabled {
        storages.push(Box::new(CertbotStorage::new(
            config.certbot_work_dir.clone(),
            config.certbot_bin.clone(),
        )));
    } else {
        storages.push(Box::new(LegoStorage::new(&config.var_dir)));
    }

    Ok(CertificateManager::new(config, acme_client, StorageRegistry::new(storages)))
}

/// Hex-encode without pulling in a dedicated crate for 32 bytes.
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logger(&config.log_level);

    match cli.command {
        Command::IssueCert {
            domain,
            email,
            web_server,
            mut subjects,
            assign,
            prevent_reload,
        } => {
            let manager = build_manager(&config)?;
            if subjects.is_empty() {
                subjects.push(domain.clone());
            }
            let cert = manager.issue(IssueRequest {
                email,
                server_name: domain,
                web_server,
                challenge_type: "http".to_string(),
                subjects,
                assign,
                prevent_reload,
            })?;
            println!("{}", serde_json::to_string_pretty(&cert).unwrap());
        }
        Command::DeployCert {
            domain,
            web_server,
            cert_name,
            cert_file,
            key_file,
        } => {
            let manager = build_manager(&config)?;
            let mut pem = fs::read_to_string(&cert_file).map_err(CoreError::from)?;
            pem.push('\n');
            pem.push_str(&fs::read_to_string(&key_file).map_err(CoreError::from)?);
            let cert = manager.upload(UploadRequest {
                server_name: domain,
                web_server,
                cert_name,
                pem_certificate: pem,
            })?;
            println!("{}", serde_json::to_string_pretty(&cert).unwrap());
        }
        Command::AssignCert {
            domain,
            web_server,
            cert_name,
            storage_type,
        } => {
            let manager = build_manager(&config)?;
            let cert = manager.assign(AssignRequest {
                server_name: domain,
                web_server,
                cert_name,
                storage_type,
            })?;
            println!("{}", serde_json::to_string_pretty(&cert).unwrap());
        }
        Command::ListCerts { storage_type } => {
            let manager = build_manager(&config)?;
            let certs = manager.list_certificates(&storage_type)?;
            println!("{}", serde_json::to_string_pretty(&certs).unwrap());
        }
        Command::CertInfo { cert_name, storage_type } => {
            let manager = build_manager(&config)?;
            let cert = manager.get_certificate(CertNameRequest { cert_name, storage_type })?;
            println!("{}", serde_json::to_string_pretty(&cert).unwrap());
        }
        Command::RemoveCert { cert_name, storage_type } => {
            let manager = build_manager(&config)?;
            manager.remove_certificate(CertNameRequest { cert_name, storage_type })?;
        }
        Command::CommonDir {
            domain,
            web_server,
            enable,
            disable,
        } => {
            let manager = build_manager(&config)?;
            if enable || disable {
                manager.change_common_dir(CommonDirChangeRequest {
                    web_server,
                    server_name: domain,
                    status: enable,
                })?;
            } else {
                let status = manager.common_dir_status(&web_server, &domain)?;
                println!("{}", serde_json::to_string_pretty(&status).unwrap());
            }
        }
        Command::GenerateToken => {
            let mut buf = [0u8; 32];
            rand_bytes(&mut buf).map_err(|e| CoreError::external(e.to_string()))?;
            println!("{}", to_hex(&buf));
        }
        Command::Serve => {
            // `build_manager` here only validates that the configured webservers
            // and storages construct cleanly; the request dispatcher that would
            // actually call into `CertificateManager` per inbound request is a
            // boundary adapter out of this crate's scope (spec.md §1).
            let _manager = build_manager(&config)?;
            log::info!(
                "sslbot core configured, listening on port {} (request dispatcher runs out of process)",
                config.port
            );
            tokio::signal::ctrl_c().await.map_err(CoreError::from)?;
            log::info!("shutdown signal received");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
