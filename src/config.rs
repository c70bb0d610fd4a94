#![cfg(feature = "web")]
use crate::chart::{ChartStyle, LegendPosition, Palette};
use crate::loader::DataSource;
use clap::Parser;
use std::path::PathBuf;

/// Road traffic injury dashboard server
///
/// Every flag can also be set through the matching `DASHBOARD_*` variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "dashboard")]
#[command(about = "Password-gated road traffic injury dashboard")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "DASHBOARD_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Shared password for the page gate
    #[arg(long, env = "DASHBOARD_PASSWORD", default_value = "msba", hide_env_values = true)]
    pub password: String,

    /// CSV to fetch on every page load
    #[arg(long, env = "DASHBOARD_DATA_URL", conflicts_with_all = ["data_file", "upload"])]
    pub data_url: Option<String>,

    /// Local CSV to read on every page load
    #[arg(long, env = "DASHBOARD_DATA_FILE", conflicts_with = "upload")]
    pub data_file: Option<PathBuf>,

    /// Ask each signed-in user to upload their own CSV (the default when no
    /// URL or file is given)
    #[arg(long, env = "DASHBOARD_UPLOAD")]
    pub upload: bool,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 900)]
    pub height: u32,

    /// Base chart font size
    #[arg(long, default_value_t = 14)]
    pub font_size: u32,

    #[arg(long, value_enum, default_value_t = Palette::Classic)]
    pub palette: Palette,

    #[arg(long, value_enum, default_value_t = LegendPosition::UpperRight)]
    pub legend: LegendPosition,

    /// Largest accepted upload in bytes
    #[arg(long, env = "DASHBOARD_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn data_source(&self) -> DataSource {
        match (&self.data_url, &self.data_file) {
            _ if self.upload => DataSource::Upload,
            (Some(url), _) => DataSource::Remote(url.clone()),
            (None, Some(path)) => DataSource::File(path.clone()),
            (None, None) => DataSource::Upload,
        }
    }

    pub fn chart_style(&self) -> ChartStyle {
        ChartStyle {
            width: self.width,
            height: self.height,
            font_size: self.font_size,
            palette: self.palette,
            legend: self.legend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_ask_for_an_upload() {
        let config = Config::parse_from(["dashboard"]);
        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.password, "msba");
        assert_eq!(config.data_source(), DataSource::Upload);
        assert_eq!(config.chart_style().width, 1200);
    }

    #[test]
    fn remote_file_and_upload_sources() {
        let config = Config::parse_from(["dashboard", "--data-url", "https://example.org/data.csv"]);
        assert_eq!(
            config.data_source(),
            DataSource::Remote("https://example.org/data.csv".to_string())
        );

        let config = Config::parse_from(["dashboard", "--upload"]);
        assert_eq!(config.data_source(), DataSource::Upload);

        let config = Config::parse_from(["dashboard", "--data-file", "sample.csv"]);
        assert_eq!(
            config.data_source(),
            DataSource::File(PathBuf::from("sample.csv"))
        );

        assert!(Config::try_parse_from(["dashboard", "--upload", "--data-file", "x.csv"]).is_err());
    }

    #[test]
    fn cosmetic_flags_reach_the_chart_style() {
        let config = Config::parse_from([
            "dashboard",
            "--width",
            "800",
            "--height",
            "600",
            "--font-size",
            "11",
            "--palette",
            "pastel",
            "--legend",
            "lower-left",
        ]);
        let style = config.chart_style();
        assert_eq!((style.width, style.height, style.font_size), (800, 600, 11));
        assert_eq!(style.palette, Palette::Pastel);
        assert_eq!(style.legend, LegendPosition::LowerLeft);
    }
}
