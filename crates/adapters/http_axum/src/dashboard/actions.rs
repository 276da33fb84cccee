//! Form handlers behind the dashboard buttons. Each one redirects back to
//! `/` (PRG pattern).

use axum::extract::{Form, Path, State};
use axum::response::Redirect;
use serde::Deserialize;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_domain::config::{ConfigPatch, TimerPatch};
use martha_domain::error::MarthaError;
use martha_domain::relay::RelayChannel;

use super::DashboardError;
use super::home::parse_minute_of_day;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RelayForm {
    pub state: bool,
}

#[derive(Deserialize)]
pub struct ManualForm {
    pub manual: bool,
}

#[derive(Deserialize)]
pub struct TimerForm {
    /// `HH:MM`
    pub lights_on: String,
    /// `HH:MM`
    pub lights_off: String,
    pub uvc_on_min: u16,
    pub uvc_off_min: u16,
}

/// `POST /relay/{channel}`
pub async fn set_relay<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
    Path(channel): Path<String>,
    Form(form): Form<RelayForm>,
) -> Result<Redirect, DashboardError>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let channel: RelayChannel = channel.parse().map_err(MarthaError::from)?;
    state.controller.set_relay(channel, form.state).await?;
    Ok(Redirect::to("/"))
}

/// `POST /manual`
pub async fn set_manual<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
    Form(form): Form<ManualForm>,
) -> Result<Redirect, DashboardError>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    state.controller.set_manual_mode(form.manual).await?;
    Ok(Redirect::to("/"))
}

/// `POST /timer`: save the lights window and the UVC cycle.
pub async fn set_timer<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
    Form(form): Form<TimerForm>,
) -> Result<Redirect, DashboardError>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let lights_on = parse_minute_of_day(&form.lights_on)
        .ok_or(DashboardError::BadForm("lights on must be HH:MM"))?;
    let lights_off = parse_minute_of_day(&form.lights_off)
        .ok_or(DashboardError::BadForm("lights off must be HH:MM"))?;

    let patch = ConfigPatch {
        timer: Some(TimerPatch {
            lights_on_minute: Some(lights_on),
            lights_off_minute: Some(lights_off),
            uvc_on_min: Some(form.uvc_on_min),
            uvc_off_min: Some(form.uvc_off_min),
        }),
        ..ConfigPatch::default()
    };
    state.config_service.update(patch).await?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use martha_domain::relay::RelayChannel;

    use crate::testing::{Fixture, send};

    const FORM: &str = "application/x-www-form-urlencoded";

    #[tokio::test]
    async fn should_redirect_home_after_relay_toggle() {
        let fixture = Fixture::armed().await;
        send(fixture.router(), "POST", "/manual", FORM, "manual=true").await;

        let (status, _) = send(fixture.router(), "POST", "/relay/Exhaust", FORM, "state=true").await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        let status = fixture.state.controller.status().await;
        assert!(status.is_manual_mode());
        assert!(status.relay(RelayChannel::Exhaust));
    }

    #[tokio::test]
    async fn should_render_error_page_while_boot_locked() {
        let fixture = Fixture::new().await;

        let (status, body) = send(fixture.router(), "POST", "/manual", FORM, "manual=true").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("relays are boot locked"));
    }

    #[tokio::test]
    async fn should_escape_unknown_channel_in_error_page() {
        let fixture = Fixture::armed().await;

        let (status, body) = send(
            fixture.router(),
            "POST",
            "/relay/%3Cb%3Eheater",
            FORM,
            "state=true",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("&lt;b&gt;heater"));
    }

    #[tokio::test]
    async fn should_save_timer_schedule() {
        let fixture = Fixture::new().await;

        let (status, _) = send(
            fixture.router(),
            "POST",
            "/timer",
            FORM,
            "lights_on=06%3A30&lights_off=18%3A45&uvc_on_min=10&uvc_off_min=110",
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        let timer = fixture.state.config_service.get().timer;
        assert_eq!(timer.lights_on_minute, 390);
        assert_eq!(timer.lights_off_minute, 1_125);
        assert_eq!(timer.uvc_on_min, 10);
        assert_eq!(timer.uvc_off_min, 110);
    }

    #[tokio::test]
    async fn should_reject_malformed_time() {
        let fixture = Fixture::new().await;

        let (status, _) = send(
            fixture.router(),
            "POST",
            "/timer",
            FORM,
            "lights_on=25%3A00&lights_off=18%3A45&uvc_on_min=10&uvc_off_min=110",
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            fixture.state.config_service.get().timer,
            martha_domain::control::timer::TimerConfig::default()
        );
    }

    #[tokio::test]
    async fn should_reject_zero_uvc_phase() {
        let fixture = Fixture::new().await;

        let (status, _) = send(
            fixture.router(),
            "POST",
            "/timer",
            FORM,
            "lights_on=06%3A00&lights_off=18%3A00&uvc_on_min=0&uvc_off_min=110",
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
