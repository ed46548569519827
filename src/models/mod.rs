use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

pub mod event;
pub mod user;

pub type EventId = i64;
pub type UserId = i64;
pub type ActivityId = i64;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateScalar(pub Date);

#[Scalar(name = "Date")]
impl ScalarType for DateScalar {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(date_str) = &value {
            if let Ok(date) = Date::parse(date_str, DATE_FORMAT) {
                return Ok(DateScalar(date));
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        Value::String(
            self.0
                .format(DATE_FORMAT)
                .unwrap_or_else(|_| self.0.to_string()),
        )
    }
}

impl From<Date> for DateScalar {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTime(pub OffsetDateTime);

#[Scalar]
impl ScalarType for DateTime {
    fn parse(value: Value) -> InputValueResult<Self> {
        if let Value::String(date_str) = &value {
            if let Ok(datetime) = OffsetDateTime::parse(date_str, &Rfc3339) {
                return Ok(DateTime(datetime));
            }
        }

        Err(InputValueError::expected_type(value))
    }

    fn to_value(&self) -> Value {
        Value::String(
            self.0
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.0.to_string()),
        )
    }
}

impl From<OffsetDateTime> for DateTime {
    fn from(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::{ScalarType, Value};
    use time::macros::{date, datetime};

    use super::{DateScalar, DateTime};

    #[test]
    fn dates_use_iso_format() {
        let scalar = DateScalar(date!(2024 - 03 - 09));
        assert_eq!(scalar.to_value(), Value::String("2024-03-09".to_owned()));
        assert_eq!(
            DateScalar::parse(Value::String("2024-03-09".to_owned())).ok(),
            Some(scalar)
        );
        assert!(DateScalar::parse(Value::String("03/09/2024".to_owned())).is_err());
    }

    #[test]
    fn datetimes_use_rfc3339() {
        let scalar = DateTime(datetime!(2024-03-09 18:30 UTC));
        assert_eq!(
            scalar.to_value(),
            Value::String("2024-03-09T18:30:00Z".to_owned())
        );
    }
}
