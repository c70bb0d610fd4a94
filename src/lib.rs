/*!
# Road Traffic Injuries Dashboard

A password-gated, single-page dashboard over a road-traffic-injury CSV, built in Rust.

## Overview

Each page view runs the same linear pipeline from the top:

1. **Gatekeeper** - a shared password opens a session; a wrong password stops the run
2. **Loader** - the CSV is fetched from a URL, read from a local file, or taken from the
   session's upload, and checked for the six required columns
3. **Aggregator** - optional Gender / Year filters, then four grouped tables:
   mean rates by gender, mean rates by year, vehicle type counts, and mean rates
   by age group and gender
4. **Renderer** - one 2×2 figure: stacked bar, line, pie and grouped bar charts

Nothing is cached between runs. Derived tables live for one request.

## Data

Expected CSV columns: `Gender`, `Year`, `Age_Group`, `Vehicle_Type`,
`Death_Rate_per_100k`, `Injury_Rate_per_100k`. Column order does not matter and
extra columns are ignored. Empty or `NaN` rates are treated as missing and left out
of the means.

## Modules

- **record**: Record and RecordTable types, column names
- **loader**: CSV parsing and the three data sources
- **aggregate**: Filters and the four aggregations
- **gate**: Password check and per-visitor sessions
- **chart**: Chart drawing and PNG encoding (web feature)
- **config**: Command-line and environment configuration (web feature)
- **app**: Routing and page handlers (web feature)

## Endpoints

- `/login` - password form (`GET`) and check (`POST`)
- `/logout` - ends the session
- `/dashboard?gender=&year=` - the charts page
- `/upload` - CSV upload, only in upload mode
- `/api/aggregates?gender=&year=` - the four derived tables as JSON
*/

pub mod aggregate;
pub mod error;
pub mod gate;
pub mod loader;
pub mod record;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod chart;
#[cfg(feature = "web")]
pub mod config;

pub use aggregate::{Aggregates, Filter, RateMeans, YearSelection};
pub use error::{DashboardError, Result};
pub use gate::{Gatekeeper, SessionStore};
pub use loader::DataSource;
pub use record::{Metric, Record, RecordTable};
