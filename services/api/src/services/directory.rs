use sqlx::{QueryBuilder, Sqlite};

use civisure_auth::Identity;
use civisure_common::{AppError, ConsultationStatus, Pagination};
use civisure_database::{ConsultationOverview, ConsultationRequest, DbPool, Lawyer, LawyerReview};

use crate::models::{
    ConsultationRequestBody, CreateLawyerRequest, LawyerPage, LawyerProfile, LawyerRating,
    LawyerSearchQuery, ReviewRequest, SpecializationCount,
};

const REVIEW_PREVIEW_LIMIT: i64 = 10;

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn push_search_filters(query: &mut QueryBuilder<'_, Sqlite>, search: &LawyerSearchQuery) {
    if let Some(specialization) = non_blank(search.specialization.clone()) {
        query.push(" AND specialization = ").push_bind(specialization);
    }
    if let Some(city) = non_blank(search.city.clone()) {
        query.push(" AND city LIKE ").push_bind(format!("%{}%", city));
    }
    if let Some(min_rating) = search.min_rating {
        query.push(" AND rating >= ").push_bind(min_rating);
    }
    if let Some(term) = non_blank(search.search.clone()) {
        let pattern = format!("%{}%", term);
        query
            .push(" AND (full_name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR bio LIKE ")
            .push_bind(pattern.clone())
            .push(" OR specialization LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[derive(Clone)]
pub struct DirectoryService {
    db: DbPool,
}

impl DirectoryService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn search(&self, search: &LawyerSearchQuery, page: Pagination) -> Result<LawyerPage, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM lawyers WHERE 1 = 1");
        push_search_filters(&mut query, search);
        query
            .push(" ORDER BY rating DESC, total_reviews DESC, id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let lawyers = query.build_query_as::<Lawyer>().fetch_all(&self.db).await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM lawyers WHERE 1 = 1");
        push_search_filters(&mut count, search);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        Ok(LawyerPage { lawyers, total })
    }

    async fn find_lawyer(&self, id: i64) -> Result<Lawyer, AppError> {
        sqlx::query_as::<_, Lawyer>("SELECT * FROM lawyers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Lawyer not found".to_string()))
    }

    pub async fn get(&self, id: i64) -> Result<LawyerProfile, AppError> {
        let lawyer = self.find_lawyer(id).await?;

        let reviews = sqlx::query_as::<_, LawyerReview>(
            r#"
            SELECT lr.id, lr.lawyer_id, lr.user_id, lr.rating, lr.review_text, lr.created_at,
                   u.full_name AS user_name
            FROM lawyer_reviews lr
            JOIN users u ON u.id = lr.user_id
            WHERE lr.lawyer_id = ?
            ORDER BY lr.created_at DESC, lr.id DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(REVIEW_PREVIEW_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(LawyerProfile { lawyer, reviews })
    }

    pub async fn specializations(&self) -> Result<Vec<SpecializationCount>, AppError> {
        Ok(sqlx::query_as::<_, SpecializationCount>(
            r#"
            SELECT specialization, COUNT(*) AS count
            FROM lawyers
            GROUP BY specialization
            ORDER BY count DESC, specialization ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }

    /// Record a review and recompute the lawyer's aggregate in the same transaction.
    ///
    /// The INSERT is the first statement so the transaction takes SQLite's write lock
    /// before reading the aggregate; concurrent reviewers queue behind it.
    pub async fn submit_review(
        &self,
        caller: &Identity,
        lawyer_id: i64,
        review: ReviewRequest,
    ) -> Result<LawyerRating, AppError> {
        let rating = review
            .rating
            .filter(|r| (1..=5).contains(r))
            .ok_or_else(|| AppError::Validation("Rating must be between 1 and 5".to_string()))?;
        self.find_lawyer(lawyer_id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO lawyer_reviews (lawyer_id, user_id, rating, review_text) VALUES (?, ?, ?, ?)",
        )
        .bind(lawyer_id)
        .bind(caller.user_id)
        .bind(rating)
        .bind(non_blank(review.review_text))
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("You have already reviewed this lawyer".to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound("Lawyer not found".to_string())
            }
            other => AppError::Database(other),
        })?;

        let (average, total): (f64, i64) = sqlx::query_as(
            "SELECT AVG(rating), COUNT(*) FROM lawyer_reviews WHERE lawyer_id = ?",
        )
        .bind(lawyer_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE lawyers SET rating = ?, total_reviews = ? WHERE id = ?")
            .bind(average)
            .bind(total)
            .bind(lawyer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Review by {} for lawyer {}: rating now {:.2} over {} reviews",
            caller.user_id,
            lawyer_id,
            average,
            total
        );
        Ok(LawyerRating {
            rating: average,
            total_reviews: total,
        })
    }

    pub async fn request_consultation(
        &self,
        caller: &Identity,
        lawyer_id: i64,
        request: ConsultationRequestBody,
    ) -> Result<i64, AppError> {
        let missing = || AppError::Validation("Case type and description are required".to_string());
        let case_type = non_blank(request.case_type).ok_or_else(missing)?;
        let description = non_blank(request.description).ok_or_else(missing)?;
        self.find_lawyer(lawyer_id).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO consultation_requests (user_id, lawyer_id, case_type, description, preferred_date, status)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(caller.user_id)
        .bind(lawyer_id)
        .bind(&case_type)
        .bind(&description)
        .bind(non_blank(request.preferred_date))
        .bind(ConsultationStatus::Pending)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Consultation {} requested by {} with lawyer {}", id, caller.user_id, lawyer_id);
        Ok(id)
    }

    pub async fn my_consultations(&self, caller: &Identity) -> Result<Vec<ConsultationRequest>, AppError> {
        Ok(sqlx::query_as::<_, ConsultationRequest>(
            r#"
            SELECT cr.id, cr.user_id, cr.lawyer_id, cr.case_type, cr.description, cr.preferred_date,
                   cr.status, cr.created_at,
                   l.full_name AS lawyer_name, l.specialization, l.phone AS lawyer_phone,
                   l.email AS lawyer_email
            FROM consultation_requests cr
            JOIN lawyers l ON l.id = cr.lawyer_id
            WHERE cr.user_id = ?
            ORDER BY cr.created_at DESC, cr.id DESC
            "#,
        )
        .bind(caller.user_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn create_lawyer(&self, request: CreateLawyerRequest) -> Result<i64, AppError> {
        let email = request.email.trim().to_lowercase();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO lawyers (
                full_name, email, phone, specialization, experience_years, education,
                bar_registration, office_address, city, state, bio, languages,
                consultation_fee, availability
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(request.full_name.trim())
        .bind(&email)
        .bind(request.phone.trim())
        .bind(request.specialization.trim())
        .bind(request.experience_years)
        .bind(request.education.trim())
        .bind(request.bar_registration.trim())
        .bind(request.office_address.trim())
        .bind(request.city.trim())
        .bind(request.state.trim())
        .bind(non_blank(request.bio))
        .bind(non_blank(request.languages))
        .bind(request.consultation_fee)
        .bind(request.availability.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            err if err.is_unique_violation() => {
                AppError::Conflict("A lawyer with this email already exists".to_string())
            }
            err => err,
        })?;

        tracing::info!("Lawyer {} added to directory ({})", id, email);
        Ok(id)
    }

    pub async fn list_consultations(
        &self,
        status: Option<ConsultationStatus>,
        page: Pagination,
    ) -> Result<Vec<ConsultationOverview>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT cr.id, cr.user_id, cr.lawyer_id, cr.case_type, cr.description, cr.preferred_date,
                   cr.status, cr.created_at,
                   l.full_name AS lawyer_name, u.full_name AS user_name, u.email AS user_email
            FROM consultation_requests cr
            JOIN lawyers l ON l.id = cr.lawyer_id
            JOIN users u ON u.id = cr.user_id
            WHERE 1 = 1"#,
        );
        if let Some(status) = status {
            query.push(" AND cr.status = ").push_bind(status);
        }
        query
            .push(" ORDER BY cr.created_at DESC, cr.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        Ok(query
            .build_query_as::<ConsultationOverview>()
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn update_consultation_status(
        &self,
        id: i64,
        status: ConsultationStatus,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE consultation_requests SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Consultation request not found".to_string()));
        }

        tracing::info!("Consultation {} moved to {}", id, status);
        Ok(())
    }
}
