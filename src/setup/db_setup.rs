use rusqlite::{Connection, Result as RusqliteResult, Transaction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

pub fn setup_database(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'ong')),
            must_change_password INTEGER NOT NULL DEFAULT 0,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    println!("- Creating 'admins' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT,
            user_id INTEGER,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;

    println!("- Creating 'ongs' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS ongs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL,
            domains TEXT NOT NULL,
            validation_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(validation_status IN ('pending', 'validated', 'rejected')),
            logo_url TEXT,
            verification_doc_url TEXT,
            password TEXT,
            updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
            user_id INTEGER,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;

    println!("- Creating 'categories' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'cases' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS cases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            address TEXT,
            wilaya TEXT,
            moughataa TEXT,
            published_on TEXT,
            status TEXT NOT NULL DEFAULT 'ongoing'
                CHECK(status IN ('ongoing', 'resolved', 'urgent')),
            approval_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(approval_status IN ('pending', 'approved', 'rejected')),
            latitude REAL,
            longitude REAL,
            ong_id INTEGER NOT NULL,
            category_id INTEGER,
            FOREIGN KEY (ong_id) REFERENCES ongs(id),
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
        )",
        [],
    )?;

    println!("- Creating 'beneficiaries' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS beneficiaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            last_name TEXT NOT NULL,
            first_name TEXT,
            address TEXT,
            situation TEXT,
            case_id INTEGER NOT NULL,
            FOREIGN KEY (case_id) REFERENCES cases(id)
        )",
        [],
    )?;

    println!("- Creating 'media' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS media (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id INTEGER NOT NULL,
            file_url TEXT NOT NULL,
            description TEXT,
            FOREIGN KEY (case_id) REFERENCES cases(id)
        )",
        [],
    )?;

    println!("- Creating 'notifications' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id INTEGER,
            message_fr TEXT NOT NULL,
            message_ar TEXT NOT NULL,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            is_read INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    seed_default_categories(&tx)?;

    tx.commit()?;
    Ok(())
}

fn seed_default_categories(tx: &Transaction) -> RusqliteResult<()> {
    println!("- Seeding default categories...");
    let defaults = [
        ("Santé", "Accès aux soins et prise en charge médicale"),
        ("Éducation", "Scolarisation et soutien scolaire"),
        ("Logement", "Hébergement et habitat précaire"),
        ("Alimentation", "Aide alimentaire et nutrition"),
        ("Urgence", "Situations nécessitant une intervention immédiate"),
    ];
    for (name, description) in defaults {
        tx.execute(
            "INSERT OR IGNORE INTO categories (id, name, description)
             SELECT NULL, ?1, ?2
             WHERE NOT EXISTS (SELECT 1 FROM categories WHERE name = ?1)",
            [name, description],
        )?;
    }
    println!("  > {} default categories ensured.", defaults.len());
    Ok(())
}
