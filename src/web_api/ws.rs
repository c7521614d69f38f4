//! WebSocket command channel
//!
//! One socket per client. Commands arrive as `{command, ...params}`
//! JSON; every command is answered with the matching `*_result`
//! envelope, and unknown commands with an `error` envelope. Preview
//! frames and lifecycle notices are broadcast through the registry.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{
    BeepRequest, CaptureRequest, CaptureResult, CompareRequest, CompareResult, ControlResult,
    DeviceSettingsRequest, DryWetRequest, FingerTypeRequest, FingerTypeResult, LcdRequest,
    LedRequest, RollRequest, SplitRequest, SplitResult, TemplateRequest, TemplateResult,
};
use crate::realtime_hub::{is_remote_addr, HubMessage};
use crate::state::AppState;

use super::device_status;
use crate::capture::SplitKind;

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum WsCommand {
    StartPreview,
    StopPreview,
    Capture(CaptureRequest),
    CaptureTemplate(TemplateRequest),
    SplitFourRight(SplitRequest),
    SplitTwoThumbs(SplitRequest),
    CaptureRoll(RollRequest),
    CompareTemplates(CompareRequest),
    CaptureFingerType(FingerTypeRequest),
    CaptureTwoThumbs(FingerTypeRequest),
    SetDeviceSettings(DeviceSettingsRequest),
    PlayBeep(BeepRequest),
    SetLed(LedRequest),
    SetLcd(LcdRequest),
    SetDryWet(DryWetRequest),
}

pub async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let remote = is_remote_addr(addr.ip());
    let (client_id, mut rx) = state.registry.register(remote);

    state.registry.send_to(
        client_id,
        &HubMessage::Connection {
            client_id: client_id.to_string(),
            message: "connected".to_string(),
            connected_at: state
                .registry
                .connected_at(client_id)
                .unwrap_or_else(chrono::Utc::now),
        },
    );
    state
        .registry
        .send_to(client_id, &HubMessage::Status(device_status(&state)));

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => handle_command(&recv_state, client_id, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unregister(client_id);
}

async fn handle_command(state: &AppState, client_id: Uuid, text: &str) {
    let command: WsCommand = match serde_json::from_str(text) {
        Ok(c) => c,
        Err(e) => {
            state.registry.send_to(
                client_id,
                &HubMessage::Error {
                    code: "UNKNOWN_COMMAND".to_string(),
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    let reply = run_command(state, command).await;
    state.registry.send_to(client_id, &reply);
}

async fn run_command(state: &AppState, command: WsCommand) -> HubMessage {
    let orchestrator = &state.orchestrator;
    match command {
        WsCommand::StartPreview => {
            let result = match state.session.ensure_ready() {
                Ok(()) => {
                    state.preview.start();
                    ControlResult::ok()
                }
                Err(e) => ControlResult::failure(e.to_string()),
            };
            HubMessage::ControlResult {
                command: "start_preview".to_string(),
                result,
            }
        }
        WsCommand::StopPreview => {
            state.preview.stop();
            HubMessage::ControlResult {
                command: "stop_preview".to_string(),
                result: ControlResult::ok(),
            }
        }
        WsCommand::Capture(req) => match orchestrator.capture_flat(&req).await {
            Ok(result) => HubMessage::CaptureResult(result),
            Err(e) => HubMessage::CaptureResult(CaptureResult::failure(e.to_string())),
        },
        WsCommand::CaptureTemplate(req) => match orchestrator.capture_template(&req).await {
            Ok(result) => HubMessage::TemplateResult(result),
            Err(e) => HubMessage::TemplateResult(TemplateResult::failure(e.to_string())),
        },
        WsCommand::SplitFourRight(req) => {
            match orchestrator.capture_split(&req, SplitKind::FourRight).await {
                Ok(result) => HubMessage::SplitResult(result),
                Err(e) => HubMessage::SplitResult(SplitResult::failure(e.to_string())),
            }
        }
        WsCommand::SplitTwoThumbs(req) => {
            match orchestrator.capture_split(&req, SplitKind::TwoThumbs).await {
                Ok(result) => HubMessage::SplitResult(result),
                Err(e) => HubMessage::SplitResult(SplitResult::failure(e.to_string())),
            }
        }
        WsCommand::CaptureRoll(req) => match orchestrator.capture_roll(&req).await {
            Ok(result) => HubMessage::RollResult(result),
            Err(e) => HubMessage::RollResult(CaptureResult::failure(e.to_string())),
        },
        WsCommand::CompareTemplates(req) => match orchestrator.compare(&req).await {
            Ok(result) => HubMessage::CompareResult(result),
            Err(e) => HubMessage::CompareResult(CompareResult::failure(e.to_string())),
        },
        WsCommand::CaptureFingerType(req) => finger_type_reply(state, req).await,
        WsCommand::CaptureTwoThumbs(mut req) => {
            req.finger_type = 3;
            finger_type_reply(state, req).await
        }
        WsCommand::SetDeviceSettings(req) => control_reply(
            "set_device_settings",
            orchestrator.set_device_settings(&req).await,
        ),
        WsCommand::PlayBeep(req) => {
            control_reply("play_beep", orchestrator.play_beep(req.beep_type).await)
        }
        WsCommand::SetLed(req) => control_reply("set_led", orchestrator.set_led(req.image_index).await),
        WsCommand::SetLcd(req) => control_reply("set_lcd", orchestrator.set_lcd(req.image_index).await),
        WsCommand::SetDryWet(req) => {
            control_reply("set_dry_wet", orchestrator.set_dry_wet(req.level).await)
        }
    }
}

async fn finger_type_reply(state: &AppState, req: FingerTypeRequest) -> HubMessage {
    match state.orchestrator.capture_finger_type(&req).await {
        Ok(result) => HubMessage::FingerTypeResult(result),
        Err(e) => HubMessage::FingerTypeResult(FingerTypeResult::failure(
            req.finger_type,
            e.to_string(),
        )),
    }
}

fn control_reply(command: &str, outcome: crate::error::Result<ControlResult>) -> HubMessage {
    let result = match outcome {
        Ok(result) => result,
        Err(e) => ControlResult::failure(e.to_string()),
    };
    HubMessage::ControlResult {
        command: command.to_string(),
        result,
    }
}
