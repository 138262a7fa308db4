use super::test_helpers::*;
use super::*;
use crate::error::{Error, QuotaError, ValidationError};
use crate::types::{ConversionMode, Event, Status, UploadFile};
use std::time::Duration;
