use civisure_auth::PasswordService;
use civisure_common::{AppError, UserRole};

use crate::connection::{applied_migration_count, DbPool, MIGRATOR};

struct SeedUser {
    email: &'static str,
    password: &'static str,
    full_name: &'static str,
    phone: &'static str,
    role: UserRole,
}

const DEFAULT_USERS: &[SeedUser] = &[
    SeedUser {
        email: "admin@civisure.com",
        password: "admin123",
        full_name: "Admin User",
        phone: "1234567890",
        role: UserRole::Admin,
    },
    SeedUser {
        email: "user@civisure.com",
        password: "user123",
        full_name: "Test User",
        phone: "0987654321",
        role: UserRole::User,
    },
];

// (full_name, email, phone, specialization, experience_years, education, bar_registration,
//  office_address, city, state, bio, languages, consultation_fee, availability)
type SeedLawyer = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    i64,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    f64,
    &'static str,
);

const SAMPLE_LAWYERS: &[SeedLawyer] = &[
    (
        "Anita Sharma",
        "anita.sharma@civisure.com",
        "9876500001",
        "Criminal Law",
        12,
        "LL.M., National Law School",
        "BAR/DL/2012/0451",
        "14 Court Lane",
        "Delhi",
        "Delhi",
        "Defends clients in criminal trials and bail matters.",
        "English, Hindi",
        1500.0,
        "Mon-Fri 10:00-17:00",
    ),
    (
        "Rahul Mehta",
        "rahul.mehta@civisure.com",
        "9876500002",
        "Cyber Law",
        7,
        "LL.B., Government Law College",
        "BAR/MH/2017/1189",
        "3rd Floor, Tech Park",
        "Mumbai",
        "Maharashtra",
        "Handles online fraud, identity theft and data breach cases.",
        "English, Hindi, Marathi",
        1200.0,
        "Mon-Sat 11:00-19:00",
    ),
    (
        "Priya Nair",
        "priya.nair@civisure.com",
        "9876500003",
        "Family Law",
        9,
        "LL.B., Kerala Law Academy",
        "BAR/KL/2015/0733",
        "22 MG Road",
        "Kochi",
        "Kerala",
        "Domestic violence protection orders and custody disputes.",
        "English, Malayalam",
        1000.0,
        "Tue-Sat 09:30-16:30",
    ),
];

pub struct MigrationRunner {
    pool: DbPool,
    passwords: PasswordService,
}

impl MigrationRunner {
    pub fn new(pool: DbPool, passwords: PasswordService) -> Self {
        Self { pool, passwords }
    }

    pub async fn run_all_migrations(&self) -> Result<(), AppError> {
        tracing::info!("Starting database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        tracing::info!("All migrations completed successfully");
        Ok(())
    }

    pub async fn check_migration_status(&self) -> Result<MigrationStatus, AppError> {
        let total = MIGRATOR.migrations.len();
        let applied = applied_migration_count(&self.pool).await?.min(total);
        let pending = total - applied;

        Ok(MigrationStatus {
            total,
            applied,
            pending,
            is_up_to_date: pending == 0,
        })
    }

    /// Insert the default accounts and sample lawyers. Existing rows are left untouched.
    pub async fn seed_initial_data(&self) -> Result<SeedSummary, AppError> {
        let mut summary = SeedSummary::default();

        for user in DEFAULT_USERS {
            let hashed = self.passwords.hash_password(user.password)?;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO users (email, password, full_name, phone, role)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(user.email)
            .bind(hashed)
            .bind(user.full_name)
            .bind(user.phone)
            .bind(user.role)
            .execute(&self.pool)
            .await?;
            summary.users += result.rows_affected();
        }

        for lawyer in SAMPLE_LAWYERS {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO lawyers (
                    full_name, email, phone, specialization, experience_years, education,
                    bar_registration, office_address, city, state, bio, languages,
                    consultation_fee, availability
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(lawyer.0)
            .bind(lawyer.1)
            .bind(lawyer.2)
            .bind(lawyer.3)
            .bind(lawyer.4)
            .bind(lawyer.5)
            .bind(lawyer.6)
            .bind(lawyer.7)
            .bind(lawyer.8)
            .bind(lawyer.9)
            .bind(lawyer.10)
            .bind(lawyer.11)
            .bind(lawyer.12)
            .bind(lawyer.13)
            .execute(&self.pool)
            .await?;
            summary.lawyers += result.rows_affected();
        }

        tracing::info!(
            "Seed data applied: {} users, {} lawyers inserted",
            summary.users,
            summary.lawyers
        );
        Ok(summary)
    }

    /// Create an administrator, or promote the existing account with that email.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<i64, AppError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() || full_name.trim().is_empty() {
            return Err(AppError::Validation(
                "Email, password and full name are required".to_string(),
            ));
        }

        let hashed = self.passwords.hash_password(password)?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password, full_name, role)
            VALUES (?, ?, ?, 'admin')
            ON CONFLICT(email) DO UPDATE SET role = 'admin', password = excluded.password
            RETURNING id
            "#,
        )
        .bind(&email)
        .bind(hashed)
        .bind(full_name.trim())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Admin user ready: {} ({})", email, id);
        Ok(id)
    }
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
    pub is_up_to_date: bool,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrations: {}/{} applied, {} pending",
            self.applied, self.total, self.pending
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: u64,
    pub lawyers: u64,
}
