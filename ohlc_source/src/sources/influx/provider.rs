use async_trait::async_trait;
use reqwest::{Client, Url, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    models::{
        bar::Bar,
        request_params::{OhlcQuery, Tag},
    },
    sources::{
        ApiSnafu, ClientBuildSnafu, InitSnafu, InvalidTokenSnafu, InvalidUrlSnafu,
        MissingEnvVarSnafu, NoDataSnafu, ReqwestSnafu, SourceError, SourceInitError,
        TimeSeriesSource,
        influx::{flux, response},
    },
};

/// Connection parameters for an InfluxDB v2 server.
#[derive(Debug)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`.
    pub url: String,
    pub token: SecretString,
    pub org: String,
}

impl InfluxConfig {
    /// Reads `INFLUX_URL`, `INFLUX_TOKEN` and `INFLUX_ORG` from the environment.
    pub fn from_env() -> Result<Self, SourceInitError> {
        Ok(Self {
            url: get_env_var("INFLUX_URL").context(MissingEnvVarSnafu)?,
            token: SecretString::from(get_env_var("INFLUX_TOKEN").context(MissingEnvVarSnafu)?),
            org: get_env_var("INFLUX_ORG").context(MissingEnvVarSnafu)?,
        })
    }
}

pub struct InfluxSource {
    client: Client,
    query_url: Url,
    _token: SecretString,
}

impl InfluxSource {
    /// Creates a new InfluxDB source.
    ///
    /// The token is sent as `Authorization: Token <token>` on every request.
    pub fn new(config: InfluxConfig) -> Result<Self, SourceInitError> {
        let mut query_url = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| e.to_string())
            .and_then(|u| u.join("/api/v2/query").map_err(|e| e.to_string()))
            .map_err(|message| {
                InvalidUrlSnafu {
                    url: config.url.clone(),
                    message,
                }
                .build()
            })?;
        query_url.query_pairs_mut().append_pair("org", &config.org);

        let mut auth = header::HeaderValue::from_str(&format!(
            "Token {}",
            config.token.expose_secret()
        ))
        .context(InvalidTokenSnafu)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/vnd.flux"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/csv"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            query_url,
            _token: config.token,
        })
    }

    /// Creates a source from the `INFLUX_*` environment variables.
    pub fn from_env() -> Result<Self, SourceError> {
        InfluxConfig::from_env()
            .and_then(Self::new)
            .context(InitSnafu)
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    /// Posts a Flux query and returns the raw CSV body.
    async fn run_query(&self, flux: String) -> Result<String, SourceError> {
        debug!(query = %flux, "running flux query");
        let response = self
            .client
            .post(self.query_url.clone())
            .body(flux)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        response.text().await.context(ReqwestSnafu)
    }
}

#[async_trait]
impl TimeSeriesSource for InfluxSource {
    async fn list_tag_values(&self, bucket: &str, tag: Tag) -> Result<Vec<String>, SourceError> {
        let body = self.run_query(flux::tag_values(bucket, tag)).await?;
        let values = response::tag_values(&body)?;
        info!(%tag, count = values.len(), "fetched tag values");
        Ok(values)
    }

    async fn query_ohlc(&self, query: &OhlcQuery) -> Result<Vec<Bar>, SourceError> {
        let body = self.run_query(flux::ohlc(query)).await?;
        if body.trim().is_empty() {
            return NoDataSnafu {
                message: "Query returned no data.",
            }
            .fail();
        }

        let bars = response::pivot_bars(&body)?;
        if bars.is_empty() {
            return NoDataSnafu {
                message: "No valid OHLC data remained after cleaning.",
            }
            .fail();
        }

        info!(
            symbol = %query.symbol,
            timeframe = %query.timeframe,
            bars = bars.len(),
            "fetched OHLC bars"
        );
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> InfluxConfig {
        InfluxConfig {
            url: url.into(),
            token: SecretString::from("secret-token"),
            org: "my org".into(),
        }
    }

    #[test]
    fn builds_query_url_with_org() {
        let source = InfluxSource::new(config("http://localhost:8086/")).unwrap();
        assert_eq!(
            source.query_url().as_str(),
            "http://localhost:8086/api/v2/query?org=my+org"
        );
    }

    #[test]
    fn rejects_bad_url_and_token() {
        assert!(matches!(
            InfluxSource::new(config("not a url")),
            Err(SourceInitError::InvalidUrl { .. })
        ));

        let mut bad_token = config("http://localhost:8086");
        bad_token.token = SecretString::from("line\nbreak");
        assert!(matches!(
            InfluxSource::new(bad_token),
            Err(SourceInitError::InvalidToken { .. })
        ));
    }
}
