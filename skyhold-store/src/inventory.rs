use skyhold_core::repository::ensure_seat_count;
use skyhold_core::{BookingId, CoreError, CoreResult, FlightId, SeatClass};
use sqlx::PgConnection;

use crate::database::storage_error;

/// Conditional decrement: the row is only touched when enough seats remain,
/// so two orders racing for the last seat cannot both succeed. Runs on the
/// caller's connection so it joins the caller's transaction.
pub(crate) async fn reserve_seats(
    conn: &mut PgConnection,
    flight_id: FlightId,
    seat_class: SeatClass,
    count: i32,
) -> CoreResult<()> {
    ensure_seat_count(count)?;
    let result = sqlx::query(
        r#"
        UPDATE flight_classes
        SET total_seats = total_seats - $3
        WHERE flight_id = $1 AND seat_class = $2 AND total_seats >= $3
        "#,
    )
    .bind(flight_id)
    .bind(seat_class.as_str())
    .bind(count)
    .execute(&mut *conn)
    .await
    .map_err(storage_error)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InsufficientInventory {
            flight_id,
            seat_class,
            requested: count,
        });
    }

    Ok(())
}

async fn release_seats(
    conn: &mut PgConnection,
    flight_id: FlightId,
    seat_class: SeatClass,
    count: i32,
) -> CoreResult<()> {
    ensure_seat_count(count)?;
    sqlx::query(
        r#"
        UPDATE flight_classes
        SET total_seats = total_seats + $3
        WHERE flight_id = $1 AND seat_class = $2
        "#,
    )
    .bind(flight_id)
    .bind(seat_class.as_str())
    .bind(count)
    .execute(&mut *conn)
    .await
    .map_err(storage_error)?;

    Ok(())
}

/// Give back what was persisted for a booking, not what the caller holds.
/// The caller must already own the booking's status change in `conn`'s
/// transaction, otherwise two callers could release the same seats.
pub(crate) async fn release_booking_seats(
    conn: &mut PgConnection,
    booking_id: BookingId,
    flight_id: FlightId,
) -> CoreResult<()> {
    let reserved: Vec<(String, i64)> = sqlx::query_as(
        "SELECT seat_class, COUNT(*) FROM booking_details WHERE booking_id = $1 GROUP BY seat_class",
    )
    .bind(booking_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage_error)?;

    for (seat_class, count) in reserved {
        let seat_class: SeatClass = seat_class.parse()?;
        release_seats(conn, flight_id, seat_class, count as i32).await?;
    }
    Ok(())
}
