//! Devices registered for push notifications.

use crate::config::RequestOptions;
use crate::entity::{Entity, EntityCore};
use crate::error::{SdkError, SdkResult};
use crate::paging::PagedList;
use crate::platform::{decode_records, Platform};
use crate::registry::{EntityRegistry, FromRecord};
use crate::request::{Action, ApiRequest, Query, Resource};
use apsdk_protocol::EntityRecord;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

const KIND: &str = "device";

/// Platform of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Apple iOS.
    Ios,
    /// Android.
    Android,
    /// Windows Phone.
    WindowsPhone,
}

impl DeviceType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ios => "ios",
            DeviceType::Android => "android",
            DeviceType::WindowsPhone => "wp",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(DeviceType::Ios),
            "android" => Ok(DeviceType::Android),
            "wp" | "windowsphone" => Ok(DeviceType::WindowsPhone),
            _ => Err(SdkError::invalid_format("devicetype", s, "ios, android or wp")),
        }
    }
}

/// A geographic point stored as `"lat,long"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geocode {
    latitude: f64,
    longitude: f64,
}

impl Geocode {
    /// Creates a point. Latitude must lie in [-90, 90] and longitude in
    /// [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> SdkResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SdkError::validation(format!(
                "latitude {latitude} is out of range"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SdkError::validation(format!(
                "longitude {longitude} is out of range"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Geocode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl FromStr for Geocode {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SdkError::invalid_format("location", s, "lat,long");
        let (lat, long) = s.split_once(',').ok_or_else(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
        let long = long.trim().parse::<f64>().map_err(|_| invalid())?;
        Geocode::new(lat, long).map_err(|_| invalid())
    }
}

/// A device record. The schema is always `device`.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    core: EntityCore,
}

impl Device {
    /// Creates a new, unregistered device.
    pub fn new(device_type: DeviceType) -> Self {
        let mut device = Self::from_core(EntityCore::new(KIND));
        device.set_device_type(device_type);
        device
    }

    /// Creates a stub for an existing device. Nothing is fetched.
    pub fn stub(id: impl Into<String>) -> Self {
        Self::from_core(EntityCore::stub(KIND, id))
    }

    pub(crate) fn from_core(core: EntityCore) -> Self {
        Self { core }
    }

    /// Device platform. Fails if the property is missing or unrecognised.
    pub fn device_type(&self) -> SdkResult<DeviceType> {
        match self.core.store().raw("devicetype") {
            Some(raw) if !raw.trim().is_empty() => raw.parse(),
            _ => Err(SdkError::validation("devicetype cannot be empty")),
        }
    }

    /// Sets the device platform.
    pub fn set_device_type(&mut self, device_type: DeviceType) {
        self.core.store_mut().set("devicetype", device_type);
    }

    /// Push token.
    pub fn device_token(&self) -> Option<&str> {
        self.core.store().raw("devicetoken")
    }

    /// Sets the push token.
    pub fn set_device_token(&mut self, token: &str) {
        self.core.store_mut().set("devicetoken", token);
    }

    /// Badge count. Missing means 0.
    pub fn badge(&self) -> SdkResult<i64> {
        Ok(self.core.store().get::<i64>("badge")?.unwrap_or(0))
    }

    /// Sets the badge count. Negative values are rejected.
    pub fn set_badge(&mut self, badge: i64) -> SdkResult<()> {
        if badge < 0 {
            return Err(SdkError::validation("badge cannot be less than 0"));
        }
        self.core.store_mut().set("badge", badge);
        Ok(())
    }

    /// Location, if set.
    pub fn location(&self) -> SdkResult<Option<Geocode>> {
        self.core.store().get::<Geocode>("location")
    }

    /// Sets or clears the location.
    pub fn set_location(&mut self, location: Option<Geocode>) {
        match location {
            Some(location) => self.core.store_mut().set("location", location),
            None => self.core.store_mut().remove("location"),
        }
    }

    /// Whether the device receives pushes. Missing means true.
    pub fn is_active(&self) -> SdkResult<bool> {
        Ok(self.core.store().get::<bool>("isactive")?.unwrap_or(true))
    }

    /// Sets whether the device receives pushes.
    pub fn set_active(&mut self, active: bool) {
        self.core.store_mut().set("isactive", active);
    }

    /// Time zone as stored by the platform.
    pub fn timezone(&self) -> Option<&str> {
        self.core.store().raw("timezone")
    }

    /// Sets or clears the time zone.
    pub fn set_timezone(&mut self, timezone: Option<&str>) {
        match timezone {
            Some(zone) => self.core.store_mut().set("timezone", zone),
            None => self.core.store_mut().remove("timezone"),
        }
    }

    /// Reads a device by id.
    pub async fn get(platform: &Platform, id: &str, options: &RequestOptions) -> SdkResult<Self> {
        let record = platform
            .get_record(Resource::Device, KIND, id, options)
            .await?;
        Self::from_record(record, platform.registry())
    }

    /// Deletes a device by id.
    pub async fn delete(platform: &Platform, id: &str, options: &RequestOptions) -> SdkResult<()> {
        platform
            .delete_record(Resource::Device, KIND, id, options)
            .await
    }

    /// Lists devices matching a query.
    pub async fn find_all(
        platform: &Platform,
        query: Query,
        options: &RequestOptions,
    ) -> SdkResult<PagedList<Self>> {
        let request = ApiRequest::new(Resource::Device, Action::Find, KIND)
            .with_query(query)
            .with_options(options);
        platform.paged(request, decode_records::<Self>).await
    }
}

impl FromRecord for Device {
    fn from_record(record: EntityRecord, _registry: &EntityRegistry) -> SdkResult<Self> {
        if !record.kind.eq_ignore_ascii_case(KIND) {
            return Err(SdkError::Schema(format!(
                "expected device but found {}",
                record.kind
            )));
        }
        Ok(Self::from_core(EntityCore::from_record(record)))
    }
}

#[async_trait]
impl Entity for Device {
    fn resource(&self) -> Resource {
        Resource::Device
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn validate(&self) -> SdkResult<()> {
        if self.core.is_new() {
            self.device_type()?;
        }
        Ok(())
    }

    async fn create_new(
        &self,
        platform: &Platform,
        options: &RequestOptions,
    ) -> SdkResult<EntityRecord> {
        platform
            .create_record(Resource::Device, Action::Register, &self.core.to_record(), options)
            .await
    }
}
