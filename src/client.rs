use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::endpoint::{EndpointPlan, Operation, PathVars, negotiate};
use crate::frame::{EcoFrame, verify_acknowledgement};
use crate::logger::{MessageLogMode, MessageLogger, curl_command};
use crate::normalize::normalize_devices;
use crate::protocol::{
    HEADER_TOKEN, HEADER_TOKEN_ID, STATUS_NO_AUTH, THERMOSTAT_MODEL, login_body, scalar_string,
    status_of, thermostat_query_body, thermostat_write_body, ventilation_query_body,
    ventilation_write_body,
};
use crate::session::{Credentials, Session, parse_discovery, parse_login};
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport, Method, Request, Transport};
use crate::types::{DeviceRecord, HvacMode};
use crate::ventilation::VentilationCommand;
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://app.intelliclima.com";
pub const DEFAULT_API_FOLDER: &str = "/";

pub struct IntelliclimaClientBuilder {
    credentials: Credentials,
    base_url: String,
    api_folder: String,
    timeout: Duration,
    plan: EndpointPlan,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl IntelliclimaClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_folder: DEFAULT_API_FOLDER.to_string(),
            timeout: DEFAULT_TIMEOUT,
            plan: EndpointPlan::default(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Folder between host and endpoint paths, e.g. `/`, `/api` or `mono`.
    pub fn api_folder(mut self, folder: impl Into<String>) -> Self {
        self.api_folder = folder.into();
        self
    }

    /// Per-request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint_plan(mut self, plan: EndpointPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<IntelliclimaClient<HttpTransport>> {
        let transport = HttpTransport::new(self.timeout)?;
        self.build_with_transport(transport)
    }

    pub fn build_with_transport<T: Transport>(self, transport: T) -> Result<IntelliclimaClient<T>> {
        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(IntelliclimaClient {
            transport,
            credentials: self.credentials,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_folder: normalize_folder(&self.api_folder),
            plan: self.plan,
            session: Session::default(),
            logger,
        })
    }
}

/// Client for one Intelliclima account.
///
/// Every operation that can touch the session takes `&mut self`, so a client
/// shared between tasks has to sit behind the caller's own lock.
pub struct IntelliclimaClient<T = HttpTransport> {
    transport: T,
    credentials: Credentials,
    base_url: String,
    api_folder: String,
    plan: EndpointPlan,
    session: Session,
    logger: Option<Mutex<MessageLogger>>,
}

impl IntelliclimaClient<HttpTransport> {
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> IntelliclimaClientBuilder {
        IntelliclimaClientBuilder::new(username, password)
    }
}

impl<T: Transport> IntelliclimaClient<T> {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Logs in and stores the token and user id.
    pub async fn authenticate(&mut self) -> Result<()> {
        info!(username = %self.credentials.username(), "authenticating with Intelliclima");
        let envelope = self.exchange(Operation::Login, Some(login_body())).await?;

        match parse_login(&envelope) {
            Ok((token, user_id)) => {
                debug!(user_id = %user_id, "authentication successful");
                self.session = Session::authenticated(token, user_id);
                Ok(())
            }
            Err(e) => {
                self.reset_session(&e);
                Err(e)
            }
        }
    }

    /// Fetches the house listing and replaces the cached house and device ids.
    pub async fn discover(&mut self) -> Result<()> {
        let envelope = self.authed_call(Operation::ListHouses, None).await?;
        let discovery = parse_discovery(&envelope);

        match &discovery {
            Some(d) => debug!(
                house_id = %d.house_id,
                thermostats = d.device_ids.thermostats.len(),
                ventilation = d.device_ids.ventilation.len(),
                "discovered house"
            ),
            None => info!("account has no houses configured"),
        }

        self.session = std::mem::take(&mut self.session).with_discovery(discovery);
        Ok(())
    }

    /// Queries one thermostat through `sync/cronos380`.
    pub async fn get_thermostat_device(&mut self, device_id: &str) -> Result<Vec<DeviceRecord>> {
        debug!(device_id, "fetching thermostat");
        let envelope = self
            .authed_call(Operation::QueryThermostat, Some(thermostat_query_body(device_id)))
            .await?;
        Ok(normalize_devices(&envelope))
    }

    pub async fn get_thermostat_devices(&mut self) -> Result<Vec<DeviceRecord>> {
        let ids: Vec<String> = valid_ids(&self.session.device_ids().thermostats);
        let mut devices = Vec::new();
        for id in ids {
            devices.extend(self.get_thermostat_device(&id).await?);
        }
        Ok(devices)
    }

    /// Queries every ventilation unit in a single `sync/cronos400` call.
    pub async fn get_ventilation_devices(&mut self) -> Result<Vec<DeviceRecord>> {
        let ids = valid_ids(&self.session.device_ids().ventilation);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(ids = %ids.join(","), "fetching ventilation units");
        let envelope = self
            .authed_call(Operation::QueryVentilation, Some(ventilation_query_body(&ids)))
            .await?;
        Ok(normalize_devices(&envelope))
    }

    /// Login (if needed), discovery (if not cached), then one query per family.
    pub async fn get_devices(&mut self) -> Result<Vec<DeviceRecord>> {
        self.ensure_authenticated().await?;
        if self.session.house_id().is_none() {
            self.discover().await?;
        }

        let mut devices = self.get_ventilation_devices().await?;
        devices.extend(self.get_thermostat_devices().await?);
        debug!(count = devices.len(), "fetched devices");
        Ok(devices)
    }

    /// Devices keyed by id; a later duplicate replaces an earlier one.
    pub async fn get_states(&mut self) -> Result<BTreeMap<String, DeviceRecord>> {
        let devices = self.get_devices().await?;
        Ok(devices.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    /// Writes setpoint and mode to a C800WiFi thermostat.
    pub async fn set_thermostat_state(
        &mut self,
        serial: &str,
        target_temperature: f64,
        mode: HvacMode,
        model: Option<&str>,
    ) -> Result<()> {
        if model != Some(THERMOSTAT_MODEL) {
            return Err(Error::UnsupportedModel(model.map(str::to_string)));
        }

        let body = thermostat_write_body(serial, target_temperature, mode.vendor_code());
        let response = self.authed_call(Operation::WriteThermostat, Some(body)).await?;
        debug!(
            serial,
            target_temperature,
            %mode,
            status = status_of(&response).unwrap_or(""),
            "thermostat write sent"
        );
        Ok(())
    }

    /// Sends an ECO trama and checks the cloud echoed it back.
    pub async fn set_ventilation_state(&mut self, serial: &str, mode: i32, speed: i32) -> Result<()> {
        if serial.trim().is_empty() {
            return Err(Error::MissingSerial);
        }

        let frame = EcoFrame::new(serial, mode, speed)?;
        let trama = frame.encode();
        info!(serial, mode, speed, trama = %trama, "ECO write");

        let response = self
            .authed_call(Operation::WriteVentilation, Some(ventilation_write_body(&trama)))
            .await?;

        let field = |key: &str| response.get(key).and_then(scalar_string).unwrap_or_default();
        verify_acknowledgement(
            &trama,
            frame.serial(),
            &field("status"),
            &field("serial"),
            &field("trama"),
        )?;

        debug!(serial, mode, speed, "ECO write acknowledged");
        Ok(())
    }

    pub async fn apply_ventilation(&mut self, serial: &str, command: VentilationCommand) -> Result<()> {
        self.set_ventilation_state(serial, i32::from(command.mode), i32::from(command.speed))
            .await
    }

    /// Runs a fresh login and discovery to prove the credentials work.
    pub async fn validate_credentials(&mut self) -> Result<()> {
        self.authenticate().await?;
        self.discover().await
    }

    // -- Helpers --

    async fn ensure_authenticated(&mut self) -> Result<()> {
        if !self.session.is_authenticated() {
            self.authenticate().await?;
        }
        Ok(())
    }

    async fn authed_call(&mut self, operation: Operation, body: Option<Value>) -> Result<Value> {
        if operation.requires_auth() {
            self.ensure_authenticated().await?;
        }
        self.exchange(operation, body).await
    }

    async fn exchange(&mut self, operation: Operation, body: Option<Value>) -> Result<Value> {
        let digest = self.credentials.password_digest();
        let vars = PathVars {
            username: Some(self.credentials.username()),
            password_hash: Some(&digest),
            user_id: self.session.user_id(),
        };
        let urls: Vec<String> = self
            .plan
            .render(operation, vars)
            .iter()
            .map(|path| self.url(path))
            .collect();
        let headers = self.headers();
        let secrets = [digest.as_str()];
        let transport = &self.transport;
        let logger = self.logger.as_ref();

        let result = negotiate(operation, urls, |url| {
            let request = Request {
                method: Method::Post,
                url,
                headers: headers.clone(),
                body: body.clone(),
            };
            execute(transport, logger, operation, request, &secrets)
        })
        .await;

        if let Err(e) = &result {
            self.reset_session(e);
        }
        result
    }

    fn reset_session(&mut self, error: &Error) {
        if error.is_authentication_failure() {
            warn!(error = %error, "authentication failure, clearing session");
            self.session = Session::default();
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let (Some(token), Some(user_id)) = (self.session.auth_token(), self.session.user_id()) {
            headers.push((HEADER_TOKEN_ID.to_string(), user_id.to_string()));
            headers.push((HEADER_TOKEN.to_string(), token.to_string()));
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            self.api_folder,
            path.trim_start_matches('/')
        )
    }
}

async fn execute<T: Transport>(
    transport: &T,
    logger: Option<&Mutex<MessageLogger>>,
    operation: Operation,
    request: Request,
    secrets: &[&str],
) -> Result<Value> {
    debug!(%operation, curl = %curl_command(&request, secrets), "HTTP request");
    if let Some(logger) = logger
        && let Ok(mut logger) = logger.lock()
    {
        logger.log_request(operation, &request, secrets);
    }

    let response = transport.send(request).await?;
    let status = response.status;
    if matches!(status, 401 | 403) {
        return Err(Error::AuthenticationFailed(format!("HTTP {status}")));
    }
    if !(200..300).contains(&status) {
        return Err(Error::HttpStatus(status));
    }
    if response.body.trim().is_empty() {
        return Err(Error::UnexpectedPayload(format!("empty body from {operation}")));
    }

    let payload: Value = serde_json::from_str(&response.body)?;
    if !payload.is_object() && !payload.is_array() {
        return Err(Error::UnexpectedPayload(format!(
            "{operation} returned a JSON scalar"
        )));
    }

    if let Some(logger) = logger
        && let Ok(mut logger) = logger.lock()
    {
        logger.log_response(operation, status, &payload);
    }

    if status_of(&payload) == Some(STATUS_NO_AUTH) {
        return Err(Error::AuthenticationFailed("session expired".to_string()));
    }
    Ok(payload)
}

/// Keeps ids made only of digits with a non-zero value; anything else in the
/// cache is skipped.
fn valid_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .filter(|id| {
            !id.is_empty()
                && id.bytes().all(|b| b.is_ascii_digit())
                && id.bytes().any(|b| b != b'0')
        })
        .cloned()
        .collect()
}

fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
