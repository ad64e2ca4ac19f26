//! Endpoint catalogue.
//!
//! Each function returns the `HttpRequest` for one server operation and does
//! nothing else. Paths and parameters may contain `{UserId}`, `{DeviceId}` or
//! `{server}`; the transport fills them in at dispatch time. Optional
//! arguments left as `None` are sent as `null` in bodies and omitted from
//! query strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::auth::TOKEN_HEADER;
use crate::http::HttpRequest;

/// Fields requested for item listings.
pub const ITEM_FIELDS: &str = "Path,Genres,SortName,Studios,Writer,Taglines,LocalTrailerCount,\
OfficialRating,CumulativeRunTimeTicks,ItemCounts,Metascore,AirTime,DateCreated,People,Overview,\
CriticRating,CriticRatingSummary,Etag,ShortOverview,ProductionLocations,Tags,ProviderIds,ParentId,\
RemoteTrailers,SpecialEpisodeNumbers,MediaSources,VoteCount,RecursiveItemCount,PrimaryImageAspectRatio";

const SYNC_QUEUE_PLUGIN: &str = "Jellyfin.Plugin.KodiSyncQueue";

fn user_path(handler: &str) -> String {
    format!("Users/{{UserId}}{handler}")
}

fn toggle(enabled: bool, handler: String) -> HttpRequest {
    if enabled {
        HttpRequest::post(handler)
    } else {
        HttpRequest::delete(handler)
    }
}

fn iso_utc(when: &DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub fn try_server() -> HttpRequest {
    HttpRequest::get("System/Info/Public")
}

/// Full server information, answered only for a valid `token`.
pub fn validate_token(token: &str) -> HttpRequest {
    HttpRequest::get("System/Info").with_header(TOKEN_HEADER, token)
}

pub fn get_system_info() -> HttpRequest {
    HttpRequest::get("System/Configuration")
}

pub fn get_transcode_settings() -> HttpRequest {
    HttpRequest::get("System/Configuration/encoding")
}

pub fn get_plugins() -> HttpRequest {
    HttpRequest::get("Plugins")
}

/// Server clock as reported by the sync-queue plugin. Also used to detect
/// whether the plugin is installed.
pub fn get_server_time() -> HttpRequest {
    HttpRequest::get(format!("{SYNC_QUEUE_PLUGIN}/GetServerDateTime"))
}

pub fn get_sync_queue(date: &str, filters: Option<&str>) -> HttpRequest {
    HttpRequest::get(format!("{SYNC_QUEUE_PLUGIN}/{{UserId}}/GetItems"))
        .with_params(json!({"LastUpdateDT": date, "filter": filters}))
}

/// Precise request/response timestamps for clock synchronisation.
pub fn get_utc_time() -> HttpRequest {
    HttpRequest::get("GetUTCTime")
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub fn authenticate_by_name(username: &str, password: &str) -> HttpRequest {
    HttpRequest::post("Users/AuthenticateByName").with_body(json!({"Username": username, "Pw": password}))
}

pub fn get_users() -> HttpRequest {
    HttpRequest::get("Users")
}

pub fn get_public_users() -> HttpRequest {
    HttpRequest::get("Users/Public")
}

/// The given user, or the logged-in user when `user_id` is `None`.
pub fn get_user(user_id: Option<&str>) -> HttpRequest {
    match user_id {
        Some(id) => HttpRequest::get(format!("Users/{id}")),
        None => HttpRequest::get(user_path("")),
    }
}

pub fn get_user_settings(client: &str) -> HttpRequest {
    HttpRequest::get("DisplayPreferences/usersettings").with_params(json!({"userId": "{UserId}", "client": client}))
}

pub fn get_views() -> HttpRequest {
    HttpRequest::get(user_path("/Views"))
}

pub fn get_media_folders() -> HttpRequest {
    HttpRequest::get(user_path("/Items"))
}

pub fn get_item(item_id: &str) -> HttpRequest {
    HttpRequest::get(user_path(&format!("/Items/{item_id}")))
}

pub fn get_items(item_ids: &[&str]) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({"Ids": item_ids.join(","), "Fields": ITEM_FIELDS}))
}

pub fn get_suggestion(media: &str, limit: u32) -> HttpRequest {
    HttpRequest::get(user_path("/Suggestions")).with_params(json!({"Type": media, "Limit": limit}))
}

pub fn get_recently_added(media: Option<&str>, parent_id: Option<&str>, limit: u32) -> HttpRequest {
    HttpRequest::get(user_path("/Items/Latest")).with_params(json!({
        "Limit": limit,
        "UserId": "{UserId}",
        "IncludeItemTypes": media,
        "ParentId": parent_id,
        "Fields": ITEM_FIELDS,
    }))
}

pub fn get_items_by_letter(parent_id: Option<&str>, media: Option<&str>, letter: Option<&str>) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({
        "ParentId": parent_id,
        "NameStartsWith": letter,
        "Fields": ITEM_FIELDS,
        "Recursive": true,
        "IncludeItemTypes": media,
    }))
}

pub fn search_media_items(term: Option<&str>, media: Option<&str>, limit: u32) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({
        "searchTerm": term,
        "Recursive": true,
        "IncludeItemTypes": media,
        "Limit": limit,
    }))
}

pub fn get_intros(item_id: &str) -> HttpRequest {
    HttpRequest::get(user_path(&format!("/Items/{item_id}/Intros")))
}

pub fn get_local_trailers(item_id: &str) -> HttpRequest {
    HttpRequest::get(user_path(&format!("/Items/{item_id}/LocalTrailers")))
}

pub fn get_items_theme_video(parent_id: &str) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({"HasThemeVideo": true, "ParentId": parent_id}))
}

pub fn get_items_theme_song(parent_id: &str) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({"HasThemeSong": true, "ParentId": parent_id}))
}

/// Direct children of `parent_id` saved since `date`.
pub fn get_date_modified(date: &str, parent_id: &str, media: Option<&str>) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({
        "ParentId": parent_id,
        "Recursive": false,
        "IsMissing": false,
        "IsVirtualUnaired": false,
        "IncludeItemTypes": media,
        "MinDateLastSaved": date,
        "Fields": ITEM_FIELDS,
    }))
}

/// Descendants of `parent_id` whose user data changed since `date`.
pub fn get_userdata_date_modified(date: &str, parent_id: &str, media: Option<&str>) -> HttpRequest {
    HttpRequest::get(user_path("/Items")).with_params(json!({
        "ParentId": parent_id,
        "Recursive": true,
        "IsMissing": false,
        "IsVirtualUnaired": false,
        "IncludeItemTypes": media,
        "MinDateLastSavedForUser": date,
        "Fields": ITEM_FIELDS,
    }))
}

pub fn favorite(item_id: &str, favorite: bool) -> HttpRequest {
    toggle(favorite, user_path(&format!("/FavoriteItems/{item_id}")))
}

pub fn item_played(item_id: &str, watched: bool) -> HttpRequest {
    toggle(watched, user_path(&format!("/PlayedItems/{item_id}")))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub fn get_sessions() -> HttpRequest {
    HttpRequest::get("Sessions").with_params(json!({"ControllableByUserId": "{UserId}"}))
}

pub fn get_device(device_id: &str) -> HttpRequest {
    HttpRequest::get("Sessions").with_params(json!({"DeviceId": device_id}))
}

/// Send `command` (e.g. `Playing/Pause`, `Message`) to another session.
pub fn post_session(session_id: &str, command: &str, params: Option<Value>, body: Option<Value>) -> HttpRequest {
    let mut request = HttpRequest::post(format!("Sessions/{session_id}/{command}"));
    if let Some(params) = params {
        request = request.with_params(params);
    }
    if let Some(body) = body {
        request = request.with_body(body);
    }
    request
}

pub fn post_capabilities(capabilities: Value) -> HttpRequest {
    HttpRequest::post("Sessions/Capabilities/Full").with_body(capabilities)
}

pub fn session_add_user(session_id: &str, user_id: &str, add: bool) -> HttpRequest {
    toggle(add, format!("Sessions/{session_id}/Users/{user_id}"))
}

pub fn session_playing(report: Value) -> HttpRequest {
    HttpRequest::post("Sessions/Playing").with_body(report)
}

pub fn session_progress(report: Value) -> HttpRequest {
    HttpRequest::post("Sessions/Playing/Progress").with_body(report)
}

pub fn session_stop(report: Value) -> HttpRequest {
    HttpRequest::post("Sessions/Playing/Stopped").with_body(report)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

pub fn get_images(item_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Items/{item_id}/Images"))
}

pub fn delete_item(item_id: &str) -> HttpRequest {
    HttpRequest::delete(format!("Items/{item_id}"))
}

pub fn get_ancestors(item_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Items/{item_id}/Ancestors")).with_param("UserId", "{UserId}")
}

pub fn get_themes(item_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Items/{item_id}/ThemeMedia"))
        .with_params(json!({"UserId": "{UserId}", "InheritFromParent": true}))
}

/// Full metadata and image refresh.
pub fn refresh_item(item_id: &str) -> HttpRequest {
    HttpRequest::post(format!("Items/{item_id}/Refresh")).with_body(json!({
        "Recursive": true,
        "ImageRefreshMode": "FullRefresh",
        "MetadataRefreshMode": "FullRefresh",
        "ReplaceAllImages": false,
        "ReplaceAllMetadata": true,
    }))
}

/// Optional stream selection for `get_play_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayInfoOptions {
    pub audio_stream_index: Option<u32>,
    pub subtitle_stream_index: Option<u32>,
    pub start_time_ticks: Option<i64>,
    pub is_playback: bool,
}

impl Default for PlayInfoOptions {
    fn default() -> Self {
        Self {
            audio_stream_index: None,
            subtitle_stream_index: None,
            start_time_ticks: None,
            is_playback: true,
        }
    }
}

pub fn get_play_info(item_id: &str, profile: Value, options: &PlayInfoOptions) -> HttpRequest {
    let mut body = json!({
        "UserId": "{UserId}",
        "DeviceProfile": profile,
        "AutoOpenLiveStream": options.is_playback,
        "IsPlayback": options.is_playback,
    });
    if let Some(index) = options.subtitle_stream_index {
        body["SubtitleStreamIndex"] = json!(index);
    }
    if let Some(index) = options.audio_stream_index {
        body["AudioStreamIndex"] = json!(index);
    }
    if let Some(ticks) = options.start_time_ticks {
        body["StartTimeTicks"] = json!(ticks);
    }
    HttpRequest::post(format!("Items/{item_id}/PlaybackInfo")).with_body(body)
}

/// URL of an item image. Not a request: the string is meant for an image
/// loader and still contains `{server}`.
pub fn artwork(item_id: &str, art: &str, max_width: u32, ext: &str, index: Option<u32>) -> String {
    match index {
        Some(index) => format!("{{server}}/Items/{item_id}/Images/{art}/{index}?MaxWidth={max_width}&format={ext}"),
        None => format!("{{server}}/Items/{item_id}/Images/{art}?MaxWidth={max_width}&format={ext}"),
    }
}

// ---------------------------------------------------------------------------
// Shows, browsing, live TV
// ---------------------------------------------------------------------------

pub fn get_next(index: Option<u32>, limit: u32) -> HttpRequest {
    HttpRequest::get("Shows/NextUp").with_params(json!({"Limit": limit, "UserId": "{UserId}", "StartIndex": index}))
}

pub fn get_adjacent_episodes(show_id: &str, item_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Shows/{show_id}/Episodes"))
        .with_params(json!({"UserId": "{UserId}", "AdjacentTo": item_id, "Fields": "Overview"}))
}

pub fn get_season(show_id: &str, season_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Shows/{show_id}/Episodes")).with_params(json!({"UserId": "{UserId}", "SeasonId": season_id}))
}

pub fn get_seasons(show_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Shows/{show_id}/Seasons"))
        .with_params(json!({"UserId": "{UserId}", "EnableImages": true, "Fields": ITEM_FIELDS}))
}

pub fn get_genres(parent_id: Option<&str>) -> HttpRequest {
    HttpRequest::get("Genres").with_params(json!({"ParentId": parent_id, "UserId": "{UserId}", "Fields": ITEM_FIELDS}))
}

pub fn get_recommendation(parent_id: Option<&str>, limit: u32) -> HttpRequest {
    HttpRequest::get("Movies/Recommendations").with_params(json!({
        "ParentId": parent_id,
        "UserId": "{UserId}",
        "Fields": ITEM_FIELDS,
        "Limit": limit,
    }))
}

pub fn get_channels() -> HttpRequest {
    HttpRequest::get("LiveTv/Channels")
        .with_params(json!({"UserId": "{UserId}", "EnableImages": true, "EnableUserData": true}))
}

pub fn get_additional_parts(item_id: &str) -> HttpRequest {
    HttpRequest::get(format!("Videos/{item_id}/AdditionalParts"))
}

pub fn get_live_stream(item_id: &str, play_id: &str, token: &str, profile: Value) -> HttpRequest {
    HttpRequest::post("LiveStreams/Open").with_body(json!({
        "UserId": "{UserId}",
        "DeviceProfile": profile,
        "OpenToken": token,
        "PlaySessionId": play_id,
        "ItemId": item_id,
    }))
}

pub fn close_live_stream(live_id: &str) -> HttpRequest {
    HttpRequest::post("LiveStreams/Close").with_body(json!({"LiveStreamId": live_id}))
}

pub fn close_transcode(device_id: &str) -> HttpRequest {
    HttpRequest::delete("Videos/ActiveEncodings").with_param("DeviceId", device_id)
}

/// Universal audio stream. Meant to be executed in streaming mode.
pub fn get_audio_stream(
    item_id: &str,
    play_id: &str,
    container: &str,
    max_streaming_bitrate: u64,
    audio_codec: Option<&str>,
) -> HttpRequest {
    HttpRequest::get(format!("Audio/{item_id}/universal")).with_params(json!({
        "UserId": "{UserId}",
        "DeviceId": "{DeviceId}",
        "PlaySessionId": play_id,
        "Container": container,
        "MaxStreamingBitrate": max_streaming_bitrate,
        "AudioCodec": audio_codec,
    }))
}

// ---------------------------------------------------------------------------
// SyncPlay
// ---------------------------------------------------------------------------

pub fn get_sync_play(item_id: Option<&str>) -> HttpRequest {
    HttpRequest::get("SyncPlay/List").with_params(json!({"FilterItemId": item_id}))
}

pub fn join_sync_play(group_id: &str) -> HttpRequest {
    HttpRequest::post("SyncPlay/Join").with_body(json!({"GroupId": group_id}))
}

pub fn leave_sync_play() -> HttpRequest {
    HttpRequest::post("SyncPlay/Leave")
}

#[deprecated(note = "servers up to 10.7.0 only; use unpause_sync_play")]
pub fn play_sync_play() -> HttpRequest {
    HttpRequest::post("SyncPlay/Play")
}

pub fn pause_sync_play() -> HttpRequest {
    HttpRequest::post("SyncPlay/Pause")
}

/// 10.7.0+
pub fn unpause_sync_play() -> HttpRequest {
    HttpRequest::post("SyncPlay/Unpause")
}

pub fn seek_sync_play(position_ticks: i64) -> HttpRequest {
    HttpRequest::post("SyncPlay/Seek").with_body(json!({"PositionTicks": position_ticks}))
}

fn playback_state(handler: &str, when: &DateTime<Utc>, position_ticks: i64, is_playing: bool, item_id: &str) -> HttpRequest {
    HttpRequest::post(handler).with_body(json!({
        "When": iso_utc(when),
        "PositionTicks": position_ticks,
        "IsPlaying": is_playing,
        "PlaylistItemId": item_id,
    }))
}

pub fn buffering_sync_play(when: &DateTime<Utc>, position_ticks: i64, is_playing: bool, item_id: &str) -> HttpRequest {
    playback_state("SyncPlay/Buffering", when, position_ticks, is_playing, item_id)
}

/// 10.7.0+
pub fn ready_sync_play(when: &DateTime<Utc>, position_ticks: i64, is_playing: bool, item_id: &str) -> HttpRequest {
    playback_state("SyncPlay/Ready", when, position_ticks, is_playing, item_id)
}

/// 10.7.0+
pub fn reset_queue_sync_play(queue_item_ids: &[&str], position: u32, position_ticks: i64) -> HttpRequest {
    HttpRequest::post("SyncPlay/SetNewQueue").with_body(json!({
        "PlayingQueue": queue_item_ids,
        "PlayingItemPosition": position,
        "StartPositionTicks": position_ticks,
    }))
}

/// 10.7.0+
pub fn ignore_sync_play(should_ignore: bool) -> HttpRequest {
    HttpRequest::post("SyncPlay/SetIgnoreWait").with_body(json!({"IgnoreWait": should_ignore}))
}

/// 10.7.0+
pub fn next_sync_play(item_id: &str) -> HttpRequest {
    HttpRequest::post("SyncPlay/NextItem").with_body(json!({"PlaylistItemId": item_id}))
}

/// 10.7.0+
pub fn prev_sync_play(item_id: &str) -> HttpRequest {
    HttpRequest::post("SyncPlay/PreviousItem").with_body(json!({"PlaylistItemId": item_id}))
}

/// 10.7.0+
pub fn set_item_sync_play(item_id: &str) -> HttpRequest {
    HttpRequest::post("SyncPlay/SetPlaylistItem").with_body(json!({"PlaylistItemId": item_id}))
}

pub fn ping_sync_play(ping: u64) -> HttpRequest {
    HttpRequest::post("SyncPlay/Ping").with_body(json!({"Ping": ping}))
}

#[deprecated(note = "servers before 10.7.0 only; use new_sync_play_v2")]
pub fn new_sync_play() -> HttpRequest {
    HttpRequest::post("SyncPlay/New")
}

/// 10.7.0+
pub fn new_sync_play_v2(group_name: &str) -> HttpRequest {
    HttpRequest::post("SyncPlay/New").with_body(json!({"GroupName": group_name}))
}
