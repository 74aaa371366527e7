/// Test fixtures: representative JSON payloads from the upstream APIs.
///
/// These fixtures are structurally complete but truncated to the minimum
/// needed to exercise the parsers.
///
/// Synoptic response shape:
///   SUMMARY.RESPONSE_CODE       — 1 on success
///   STATION[]
///     .STID / .NAME
///     .ELEVATION / .LATITUDE / .LONGITUDE — numbers sent as STRINGS
///     .OBSERVATIONS
///       .date_time[]                       — parallel arrays, zipped by index
///       .air_temp_set_1[] / .precip_accum_set_1[] / ...
///       .precipitation[]                   — only for the precipitation service
///
/// ACIS StnData response shape:
///   meta  — station metadata
///   smry  — one summary value per requested element, as strings with
///           optional flags ("M" missing, "T" trace, "1.23A" accumulated)
///   error — present instead of smry when the request failed
///
/// OSO product: plain text, `SA MMDDHHMM` issue line, product id, `HI`/`LO` in °F
///
/// `serve_once` stands up a local HTTP stub that answers a single request,
/// for exercising the clients end to end without the network.

use std::io::Read;
use std::thread::{self, JoinHandle};

/// Latest-observations query for two ASOS stations; KSJC reported nothing.
/// One timestamp is malformed and must be dropped.
pub(crate) fn fixture_synoptic_latest_json() -> &'static str {
    r#"{
      "SUMMARY": { "RESPONSE_CODE": 1, "RESPONSE_MESSAGE": "OK", "NUMBER_OF_OBJECTS": 2 },
      "STATION": [
        {
          "STID": "KSFO",
          "NAME": "San Francisco International Airport",
          "ELEVATION": "13.0",
          "LATITUDE": "37.61961",
          "LONGITUDE": "-122.36558",
          "TIMEZONE": "America/Los_Angeles",
          "OBSERVATIONS": {
            "date_time": [
              "2024-01-02T07:56:00Z",
              "2024-01-02T13:56:00Z",
              "garbage",
              "2024-01-02T19:56:00Z"
            ],
            "air_temp_set_1": [51.1, 48.0, 99.0, 57.0],
            "air_temp_high_6_hour_set_1": [null, 53.1, null, 57.9],
            "air_temp_low_6_hour_set_1": [null, 46.9, null, 48.0]
          }
        },
        {
          "STID": "KSJC",
          "NAME": "San Jose International Airport",
          "ELEVATION": "62.0",
          "LATITUDE": "37.35917",
          "LONGITUDE": "-121.92417",
          "OBSERVATIONS": {}
        }
      ]
    }"#
}

/// Hourly precipitation intervals for KSFO, including a negative sensor delta.
pub(crate) fn fixture_synoptic_precip_json() -> &'static str {
    r#"{
      "SUMMARY": { "RESPONSE_CODE": 1, "RESPONSE_MESSAGE": "OK" },
      "STATION": [
        {
          "STID": "KSFO",
          "NAME": "San Francisco International Airport",
          "ELEVATION": "13.0",
          "LATITUDE": "37.61961",
          "LONGITUDE": "-122.36558",
          "OBSERVATIONS": {
            "precipitation": [
              { "interval": 1, "first_report": "2024-01-02T06:56:00Z", "last_report": "2024-01-02T06:56:00Z", "count": 1, "total": 0.30 },
              { "interval": 2, "first_report": "2024-01-02T09:56:00Z", "last_report": "2024-01-02T09:56:00Z", "count": 1, "total": 0.12 },
              { "interval": 3, "first_report": "2024-01-02T10:56:00Z", "last_report": "2024-01-02T10:56:00Z", "count": 1, "total": -0.40 },
              { "interval": 4, "first_report": "2024-01-02T11:56:00Z", "last_report": "2024-01-02T11:56:00Z", "count": 1, "total": "0.05" },
              { "interval": 5, "first_report": null, "last_report": null, "count": 0, "total": null }
            ]
          }
        }
      ]
    }"#
}

/// Water-year timeseries for a HADS station with an accumulated gauge that
/// resets once.
pub(crate) fn fixture_synoptic_timeseries_json() -> &'static str {
    r#"{
      "SUMMARY": { "RESPONSE_CODE": 1, "RESPONSE_MESSAGE": "OK" },
      "STATION": [
        {
          "STID": "SFOC1",
          "NAME": "SAN FRANCISCO DOWNTOWN",
          "ELEVATION": "150.0",
          "LATITUDE": "37.7705",
          "LONGITUDE": "-122.4269",
          "OBSERVATIONS": {
            "date_time": [
              "2023-10-01T08:00:00Z",
              "2023-12-01T08:00:00Z",
              "2024-01-02T07:00:00Z",
              "2024-01-02T10:00:00Z",
              "2024-01-02T12:00:00Z"
            ],
            "air_temp_set_1": [60.0, 52.0, 47.0, 49.5, null],
            "precip_accum_set_1": [0.0, 4.0, 1.0, 1.3, 1.6]
          }
        }
      ]
    }"#
}

/// Synoptic rejects the token.
pub(crate) fn fixture_synoptic_error_json() -> &'static str {
    r#"{
      "SUMMARY": { "RESPONSE_CODE": 2, "RESPONSE_MESSAGE": "Invalid token." }
    }"#
}

/// ACIS totals: 3.45" so far against a 5.67" normal.
pub(crate) fn fixture_acis_summary_json() -> &'static str {
    r#"{
      "meta": { "name": "SAN FRANCISCO INTL AP", "state": "CA", "sids": ["23234 1", "KSFO 3"] },
      "smry": ["3.45", "5.67"]
    }"#
}

/// ACIS totals with a flagged accumulation and a missing normal.
pub(crate) fn fixture_acis_flagged_json() -> &'static str {
    r#"{
      "meta": { "name": "DOWNTOWN SAN FRANCISCO", "state": "CA" },
      "smry": ["2.10A", "M"]
    }"#
}

/// ACIS has no record for the requested station id.
pub(crate) fn fixture_acis_error_json() -> &'static str {
    r#"{ "error": "no data available" }"#
}

/// An OSO product for SFOC1 issued 2024-01-02 14:30Z.
pub(crate) fn fixture_oso_product() -> &'static str {
    "SA 01021430\nSFOOSOSFD\nHI 65\nLO 45\n"
}

/// Serves one canned response on a local port. Returns the base URL and a
/// handle yielding the request's URL (path and query) and body.
pub(crate) fn serve_once(
    status: u16,
    body: &'static str,
) -> (String, JoinHandle<(String, String)>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("stub server should bind");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("stub server should listen on an IP address");

    let handle = thread::spawn(move || {
        let mut request = server.recv().expect("stub server should receive a request");
        let mut received = String::new();
        request
            .as_reader()
            .read_to_string(&mut received)
            .expect("request body should be text");
        let url = request.url().to_string();
        request
            .respond(tiny_http::Response::from_string(body).with_status_code(status))
            .expect("stub server should respond");
        (url, received)
    });

    (format!("http://{}", addr), handle)
}
