use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::booking::{BookingDetail, BookingWorkflow};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{ApiErrorWithMeta, BookingError, E_PAYMENT_CONFLICT};
use crate::payments::PaymentProcessor;
use crate::points::{PointsLedger, VoidOutcome};
use crate::responses::{ApiOk, Pagination, RequestMeta, meta_middleware};
use crate::store::{Store, UserStore};
use crate::types::{
    Booking, BookingStatus, Payment, PaymentMethod, PointType, PointsTransaction, SeatAvailability,
};

/// The application state: every port constructed once, shared by reference.
#[derive(Clone)]
pub struct AppState {
    pub workflow: BookingWorkflow,
    pub payments: PaymentProcessor,
    pub points: PointsLedger,
    pub catalog: Catalog,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let store = Store::new(pool.clone());
        let catalog = Catalog::new(pool.clone());
        let users = UserStore::new(pool);
        let workflow = BookingWorkflow::new(catalog.clone(), users.clone(), store.clone());
        let payments = PaymentProcessor::new(store.clone());
        let points = PointsLedger::new(users, store);
        Self {
            workflow,
            payments,
            points,
            catalog,
            config,
        }
    }
}

/// The request to create a new booking.
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    /// The user booking the seats.
    pub user_id: i64,
    /// The showtime being booked.
    pub showtime_id: i64,
    /// The seats to reserve, at least one.
    pub seats: Vec<SeatSelection>,
}

/// One requested seat.
#[derive(Deserialize)]
pub struct SeatSelection {
    pub seat_id: i64,
}

/// Query parameters of the booking list.
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<i64>,
    pub status: Option<String>,
}

/// Pagination-only query parameters.
#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// The request to register a payment for a booking.
#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub booking_id: i64,
    pub method: PaymentMethod,
}

/// The request to run a registered payment through the gateway.
#[derive(Deserialize)]
pub struct ProcessPaymentRequest {
    /// Optionally switches the payment channel before charging.
    pub method: Option<PaymentMethod>,
}

/// The request to write a points-ledger entry directly.
#[derive(Deserialize)]
pub struct CreatePointsRequest {
    pub user_id: i64,
    pub booking_id: i64,
    #[serde(rename = "type")]
    pub point_type: PointType,
    pub points: i64,
}

/// The request to earn or redeem points against a booking.
#[derive(Deserialize)]
pub struct AdjustPointsRequest {
    pub user_id: i64,
    pub booking_id: i64,
    pub points: i64,
}

/// Query parameter of the available-seats lookup.
#[derive(Deserialize)]
pub struct AvailableSeatsQuery {
    pub showtime_id: Option<i64>,
}

#[derive(Serialize)]
pub struct AvailableSeatsResponse {
    pub cinema: CinemaInfo,
    pub available_seats: Vec<SeatAvailability>,
    pub total_available: usize,
}

#[derive(Serialize)]
pub struct CinemaInfo {
    pub id: i64,
    pub cinema_type: String,
    pub total_seats: i32,
}

pub fn init_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/bookings",
            post(create_booking_handler).get(list_bookings_handler),
        )
        .route(
            "/bookings/{id}",
            get(get_booking_handler).delete(cancel_booking_handler),
        )
        .route("/bookings/user/{user_id}", get(list_user_bookings_handler))
        .route(
            "/bookings/{id}/confirm-payment",
            put(confirm_payment_handler),
        )
        .route("/bookings/{id}/cancel", put(cancel_booking_handler))
        .route("/cinemas/{id}/available-seats", get(available_seats_handler))
        .route("/payments", post(create_payment_handler))
        .route("/payments/{id}/process", put(process_payment_handler))
        .route("/payments/{id}/cancel", put(cancel_payment_handler))
        .route("/points-transactions", post(create_points_handler))
        .route("/points-transactions/earn", post(earn_points_handler))
        .route("/points-transactions/redeem", post(redeem_points_handler))
        .route("/points-transactions/{id}/void", post(void_points_handler))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(meta_middleware))
}

async fn create_booking_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<ApiOk<BookingDetail>, ApiErrorWithMeta> {
    let seat_ids: Vec<i64> = req.seats.iter().map(|s| s.seat_id).collect();

    let booking = st
        .workflow
        .create(req.user_id, req.showtime_id, &seat_ids)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::created("booking created", booking, meta))
}

async fn list_bookings_handler(
    State(st): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Vec<Booking>>, ApiErrorWithMeta> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);

    let status = query
        .status
        .as_deref()
        .map(str::parse::<BookingStatus>)
        .transpose()
        .map_err(|e| BookingError::validation(e).with_meta(meta.clone()))?;

    let (bookings, total) = st
        .workflow
        .list(page, limit, query.user_id, status)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("bookings fetched", bookings, meta)
        .with_pagination(Pagination::new(page, limit, total)))
}

async fn get_booking_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<BookingDetail>, ApiErrorWithMeta> {
    let booking = st
        .workflow
        .detail(id)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("booking fetched", booking, meta))
}

async fn list_user_bookings_handler(
    State(st): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<PageQuery>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Vec<Booking>>, ApiErrorWithMeta> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);

    let (bookings, total) = st
        .workflow
        .list_by_user(user_id, page, limit)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("bookings fetched", bookings, meta)
        .with_pagination(Pagination::new(page, limit, total)))
}

async fn confirm_payment_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<BookingDetail>, ApiErrorWithMeta> {
    let booking = st
        .workflow
        .confirm(id)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("payment confirmed", booking, meta))
}

async fn cancel_booking_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<BookingDetail>, ApiErrorWithMeta> {
    let booking = st
        .workflow
        .cancel(id)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("booking cancelled", booking, meta))
}

async fn available_seats_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<AvailableSeatsQuery>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<AvailableSeatsResponse>, ApiErrorWithMeta> {
    let (cinema, seats) = st
        .catalog
        .available_seats(id, query.showtime_id)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    let total_available = seats.iter().filter(|s| s.is_available).count();

    Ok(ApiOk::ok(
        "available seats fetched",
        AvailableSeatsResponse {
            cinema: CinemaInfo {
                id: cinema.id,
                cinema_type: cinema.cinema_type,
                total_seats: cinema.total_seats,
            },
            available_seats: seats,
            total_available,
        },
        meta,
    ))
}

async fn create_payment_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<ApiOk<Payment>, ApiErrorWithMeta> {
    let payment = st
        .payments
        .create(req.booking_id, req.method)
        .await
        .map_err(|e| match e {
            BookingError::Conflict(_) => e.with_meta(meta.clone()).with_code(E_PAYMENT_CONFLICT),
            _ => e.with_meta(meta.clone()),
        })?;

    Ok(ApiOk::created("payment created", payment, meta))
}

async fn process_payment_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<ApiOk<Payment>, ApiErrorWithMeta> {
    let payment = st
        .payments
        .process(id, req.method)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("payment processed", payment, meta))
}

async fn cancel_payment_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<Payment>, ApiErrorWithMeta> {
    let payment = st
        .payments
        .cancel(id)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("payment cancelled", payment, meta))
}

async fn create_points_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<CreatePointsRequest>,
) -> Result<ApiOk<PointsTransaction>, ApiErrorWithMeta> {
    let entry = st
        .points
        .create(req.user_id, req.booking_id, req.point_type, req.points)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::created("points transaction created", entry, meta))
}

async fn earn_points_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<AdjustPointsRequest>,
) -> Result<ApiOk<PointsTransaction>, ApiErrorWithMeta> {
    let entry = st
        .points
        .earn(req.user_id, req.booking_id, req.points)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::created("points earned", entry, meta))
}

async fn redeem_points_handler(
    State(st): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    Json(req): Json<AdjustPointsRequest>,
) -> Result<ApiOk<PointsTransaction>, ApiErrorWithMeta> {
    let entry = st
        .points
        .redeem(req.user_id, req.booking_id, req.points)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::created("points redeemed", entry, meta))
}

async fn void_points_handler(
    State(st): State<AppState>,
    Path(id): Path<i64>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<ApiOk<VoidOutcome>, ApiErrorWithMeta> {
    let outcome = st
        .points
        .void(id)
        .await
        .map_err(|e| e.with_meta(meta.clone()))?;

    Ok(ApiOk::ok("transaction voided", outcome, meta))
}
