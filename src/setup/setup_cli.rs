use clap::{Parser, Subcommand};
use ongconnect_backend::config::Config;
use ongconnect_backend::models::db_operations::users_db_operations;
use ongconnect_backend::models::Role;
use ongconnect_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_database(&config),
        },
        Commands::Admin { action } => match action {
            AdminAction::Create { name, email, password } => {
                create_admin_user(&config, name, email, password);
            }
            AdminAction::List => {
                list_admin_users(&config);
            }
            AdminAction::ChangePassword { email, new_password } => {
                change_admin_password(&config, email, new_password);
            }
        },
    }
}

fn setup_database(config: &Config) {
    let db_path = config.db_path();
    if db_path.exists() {
        println!("ℹ️ Database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create database file.");
    match db_setup::setup_database(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_database(config: &Config) -> Option<Connection> {
    let db_path = config.db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match Connection::open(&db_path) {
        Ok(c) => Some(c),
        Err(e) => {
            eprintln!("❌ Error opening database: {}", e);
            None
        }
    }
}

fn create_admin_user(config: &Config, name: &str, email: &str, password: &str) {
    let mut conn = match open_database(config) {
        Some(c) => c,
        None => return,
    };

    if users_db_operations::email_exists(&conn, email) {
        eprintln!("❌ Error: An account with the email '{}' already exists.", email);
        return;
    }

    let created = (|| -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        let user_id = users_db_operations::create_account(&tx, email, password, Role::Admin)?;
        let account = users_db_operations::read_account_by_id(&tx, user_id)
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        users_db_operations::create_admin(&tx, name, email, &account.password_hash, user_id)?;
        tx.commit()
    })();

    match created {
        Ok(()) => println!("✅ Admin user '{}' <{}> created successfully.", name, email),
        Err(e) => eprintln!("❌ Error creating admin user: {}", e),
    }
}

fn list_admin_users(config: &Config) {
    let conn = match open_database(config) {
        Some(c) => c,
        None => return,
    };

    println!("Listing Admin Users:");
    match users_db_operations::read_all_admins(&conn) {
        Ok(admins) => {
            for admin in admins {
                println!("- {} <{}>", admin.name, admin.email);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}", e),
    }
}

fn change_admin_password(config: &Config, email: &str, new_password: &str) {
    let conn = match open_database(config) {
        Some(c) => c,
        None => return,
    };

    let account = match users_db_operations::read_account_by_email(&conn, email) {
        Some(a) if a.role == Role::Admin => a,
        _ => {
            eprintln!("❌ Error: No admin account with the email '{}' found.", email);
            return;
        }
    };

    let changed = (|| -> Result<(), rusqlite::Error> {
        let hashed = users_db_operations::update_account_password(&conn, account.id, new_password)?;
        if let Some(admin) = users_db_operations::read_admin_by_user_id(&conn, account.id) {
            users_db_operations::update_admin_password_mirror(&conn, admin.id, &hashed)?;
        }
        Ok(())
    })();

    match changed {
        Ok(()) => println!("✅ Password for admin '{}' changed successfully.", email),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}
