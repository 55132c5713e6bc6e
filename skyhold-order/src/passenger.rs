use chrono::{Datelike, NaiveDate};
use skyhold_core::PassengerType;

/// Age in whole years on `today`. Day-of-year comparison, so a birthday
/// late in a leap year shifts by a day against non-leap years.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if today.ordinal() < dob.ordinal() {
        age -= 1;
    }
    age
}

/// Fare category from date of birth: 12+ adult, 2 to 11 child, under 2 infant
pub fn classify(dob: NaiveDate, today: NaiveDate) -> PassengerType {
    match age_on(dob, today) {
        age if age >= 12 => PassengerType::Adult,
        age if age >= 2 => PassengerType::Child,
        _ => PassengerType::Infant,
    }
}
