//! CSV rendering for the admin booking export.

use anyhow::anyhow;
use time::OffsetDateTime;

use crate::bookings::repo_types::BookingDetails;
use crate::common::format_day;

const HEADER: [&str; 7] = [
    "Booking ID",
    "User Name",
    "User Email",
    "Event Name",
    "Event Date",
    "Number of Tickets",
    "Booking Date",
];

pub fn render_csv(bookings: &[BookingDetails]) -> anyhow::Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(HEADER)?;
    for d in bookings {
        w.write_record([
            d.booking.id.to_string(),
            d.user.name.clone(),
            d.user.email.clone(),
            d.event.name.clone(),
            format_day(d.event.date)?,
            d.booking.number_of_tickets.to_string(),
            format_day(d.booking.booking_date)?,
        ])?;
    }
    w.into_inner().map_err(|e| anyhow!("flush csv: {}", e.error()))
}

/// `bookings-YYYY-MM-DD.csv` for the given export time.
pub fn file_name(at: OffsetDateTime) -> anyhow::Result<String> {
    Ok(format!("bookings-{}.csv", format_day(at)?))
}
