use std::time::Duration;

use serde_json::Value;

use super::error::FetchError;

const IPAPI_URL: &str = "https://ipapi.co/json/";
const IPINFO_URL: &str = "https://ipinfo.io/json";

/// Approximate location of this host's public IP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub lat: f64,
    pub lon: f64,
    pub source: &'static str,
}

/// Tries ipapi.co, then ipinfo.io. Returns the last failure if neither
/// resolves.
pub async fn geolocate(http: &reqwest::Client, timeout: Duration) -> Result<GeoFix, FetchError> {
    let lookups: [(&'static str, &str, fn(&Value) -> Option<(f64, f64)>); 2] = [
        ("ipapi.co", IPAPI_URL, parse_ipapi),
        ("ipinfo.io", IPINFO_URL, parse_ipinfo),
    ];

    let mut last_err = FetchError::NoData("no geolocation provider answered".to_string());
    for (source, url, parse) in lookups {
        match fetch_json(http, url, timeout).await {
            Ok(body) => match parse(&body) {
                Some((lat, lon)) => return Ok(GeoFix { lat, lon, source }),
                None => {
                    log::debug!("{} returned no usable location", source);
                    last_err = FetchError::Decode(format!("{} returned no location", source));
                }
            },
            Err(e) => {
                log::debug!("Geolocation via {} failed: {}", source, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

async fn fetch_json(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Value, FetchError> {
    let response = http.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            body: String::new(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))
}

/// `{"latitude": 40.7, "longitude": -73.9, ...}`
pub fn parse_ipapi(body: &Value) -> Option<(f64, f64)> {
    let lat = body["latitude"].as_f64()?;
    let lon = body["longitude"].as_f64()?;
    Some((lat, lon))
}

/// `{"loc": "40.7,-73.9", ...}`
pub fn parse_ipinfo(body: &Value) -> Option<(f64, f64)> {
    let (lat, lon) = body["loc"].as_str()?.trim().split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipapi_fields() {
        let body: Value =
            serde_json::from_str(r#"{"ip": "1.2.3.4", "latitude": 40.7128, "longitude": -74.006}"#)
                .unwrap();
        assert_eq!(parse_ipapi(&body), Some((40.7128, -74.006)));

        let limited: Value =
            serde_json::from_str(r#"{"error": true, "reason": "RateLimited"}"#).unwrap();
        assert_eq!(parse_ipapi(&limited), None);
    }

    #[test]
    fn ipinfo_loc_string() {
        let body: Value =
            serde_json::from_str(r#"{"city": "New York", "loc": "40.7143,-74.0060"}"#).unwrap();
        assert_eq!(parse_ipinfo(&body), Some((40.7143, -74.006)));

        let bad: Value = serde_json::from_str(r#"{"loc": "nowhere"}"#).unwrap();
        assert_eq!(parse_ipinfo(&bad), None);
    }
}
