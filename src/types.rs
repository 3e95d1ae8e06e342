use serde::{Deserialize, Deserializer, Serialize};

/// Prediction domain. Selects the prompt template and the encrypted weight
/// vector; anything unrecognized keeps its name and falls back to defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Domain {
    Financial,
    Gaming,
    Iot,
    Other(String),
}

impl Domain {
    pub fn as_str(&self) -> &str {
        match self {
            Domain::Financial => "financial",
            Domain::Gaming => "gaming",
            Domain::Iot => "iot",
            Domain::Other(name) => name,
        }
    }
}

impl From<String> for Domain {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "financial" => Domain::Financial,
            "gaming" => Domain::Gaming,
            "iot" => Domain::Iot,
            _ => Domain::Other(raw),
        }
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.as_str().to_string()
    }
}

/// One prediction input as submitted by the frontend. Callers send both JSON
/// strings ("50000") and bare numbers; both are kept as text so the prompt
/// can echo them verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InputValue(pub String);

impl InputValue {
    /// Numeric view; anything unparseable counts as 0.
    pub fn as_f64(&self) -> f64 {
        self.0.trim().parse().unwrap_or(0.0)
    }
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => Ok(InputValue(s)),
            serde_json::Value::Number(n) => Ok(InputValue(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number, got {other}"
            ))),
        }
    }
}

impl From<f64> for InputValue {
    fn from(v: f64) -> Self {
        // Keep integral values free of a trailing ".0" so prompts read naturally.
        if v.fract() == 0.0 && v.abs() < 1e15 {
            InputValue(format!("{}", v as i64))
        } else {
            InputValue(v.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionInputs {
    pub input1: InputValue,
    pub input2: InputValue,
    pub input3: InputValue,
}

impl PredictionInputs {
    pub fn numeric(&self) -> [f64; 3] {
        [
            self.input1.as_f64(),
            self.input2.as_f64(),
            self.input3.as_f64(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: String,
    pub model: String,
    /// In [0,1], floored at 0.6 by the variance heuristic.
    pub confidence: f64,
    pub domain: Domain,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub price: f64,
    pub change_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub volume_24h: Option<f64>,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub rank: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoins {
    pub trending: Vec<TrendingCoin>,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub description: String,
    /// Metres per second (the vendor reports km/h).
    pub wind_speed: f64,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastHour {
    pub datetime: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub city: String,
    pub country: String,
    pub forecast: Vec<ForecastHour>,
    pub timestamp: String,
}

pub fn rfc3339_now() -> String {
    chrono::Utc::now().to_rfc3339()
}
