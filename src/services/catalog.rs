use url::Url;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult, FieldErrors},
    models::{NewPlatform, NewTitle, Platform, PlatformDetail, Title},
};

const PLATFORM_NAME_MAX: usize = 30;
const WEBSITE_MAX: usize = 200;
const TITLE_NAME_MIN: usize = 2;
const TITLE_NAME_MAX: usize = 50;
const RELEASE_YEARS: std::ops::RangeInclusive<i32> = 1888..=2100;

fn platform_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Platform {} does not exist", id))
}

fn title_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Title {} does not exist", id))
}

/// Accepts absolute http(s) URLs with a non-empty host
fn is_web_url(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

/// Field checks that need no storage access
pub fn check_platform_fields(platform: &NewPlatform) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name_len = platform.name.trim().chars().count();
    if name_len == 0 {
        errors.add("name", "This field may not be blank.");
    } else if platform.name.chars().count() > PLATFORM_NAME_MAX {
        errors.add(
            "name",
            format!("Ensure this field has no more than {} characters.", PLATFORM_NAME_MAX),
        );
    }

    if platform.about.trim().is_empty() {
        errors.add("about", "This field may not be blank.");
    }

    if platform.website.chars().count() > WEBSITE_MAX {
        errors.add(
            "website",
            format!("Ensure this field has no more than {} characters.", WEBSITE_MAX),
        );
    } else if !is_web_url(&platform.website) {
        errors.add("website", "Enter a valid URL.");
    }

    errors
}

/// Field checks that need no storage access
pub fn check_title_fields(title: &NewTitle) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name_len = title.name.trim().chars().count();
    if name_len < TITLE_NAME_MIN {
        errors.add("name", "Name is too short.");
    } else if title.name.chars().count() > TITLE_NAME_MAX {
        errors.add(
            "name",
            format!("Ensure this field has no more than {} characters.", TITLE_NAME_MAX),
        );
    }

    if title.description.trim().is_empty() {
        errors.add("description", "This field may not be blank.");
    } else if title.description == title.name {
        errors.add("non_field_errors", "Name and description must be different.");
    }

    if !RELEASE_YEARS.contains(&title.release_year) {
        errors.add(
            "release_year",
            format!(
                "Release year must be between {} and {}.",
                RELEASE_YEARS.start(),
                RELEASE_YEARS.end()
            ),
        );
    }

    errors
}

async fn validate_platform(
    store: &dyn CatalogStore,
    platform: &NewPlatform,
    except: Option<i64>,
) -> AppResult<()> {
    let mut errors = check_platform_fields(platform);
    if errors.get("name").is_none() && store.platform_name_taken(&platform.name, except).await? {
        errors.add("name", "A platform with this name already exists.");
    }
    errors.into_result()
}

async fn validate_title(store: &dyn CatalogStore, title: &NewTitle) -> AppResult<()> {
    let mut errors = check_title_fields(title);
    if store.get_platform(title.platform_id).await?.is_none() {
        errors.add("platform_id", "Platform does not exist.");
    }
    errors.into_result()
}

pub async fn list_platforms(store: &dyn CatalogStore) -> AppResult<Vec<Platform>> {
    store.list_platforms().await
}

/// Loads a platform together with its titles
pub async fn get_platform(store: &dyn CatalogStore, id: i64) -> AppResult<PlatformDetail> {
    let platform = store
        .get_platform(id)
        .await?
        .ok_or_else(|| platform_not_found(id))?;
    let watchlist = store.list_titles(Some(id)).await?;
    Ok(PlatformDetail {
        platform,
        watchlist,
    })
}

pub async fn create_platform(store: &dyn CatalogStore, platform: NewPlatform) -> AppResult<Platform> {
    validate_platform(store, &platform, None).await?;
    store.create_platform(platform).await
}

pub async fn update_platform(
    store: &dyn CatalogStore,
    id: i64,
    platform: NewPlatform,
) -> AppResult<Platform> {
    if store.get_platform(id).await?.is_none() {
        return Err(platform_not_found(id));
    }
    validate_platform(store, &platform, Some(id)).await?;
    let updated = store
        .update_platform(id, platform)
        .await?
        .ok_or_else(|| platform_not_found(id))?;

    tracing::info!(platform_id = id, "Platform updated");
    Ok(updated)
}

pub async fn delete_platform(store: &dyn CatalogStore, id: i64) -> AppResult<()> {
    if !store.delete_platform(id).await? {
        return Err(platform_not_found(id));
    }
    tracing::info!(platform_id = id, "Platform deleted with its titles");
    Ok(())
}

pub async fn list_titles(store: &dyn CatalogStore) -> AppResult<Vec<Title>> {
    store.list_titles(None).await
}

pub async fn get_title(store: &dyn CatalogStore, id: i64) -> AppResult<Title> {
    store.get_title(id).await?.ok_or_else(|| title_not_found(id))
}

pub async fn create_title(store: &dyn CatalogStore, title: NewTitle) -> AppResult<Title> {
    validate_title(store, &title).await?;
    store.create_title(title).await
}

pub async fn update_title(store: &dyn CatalogStore, id: i64, title: NewTitle) -> AppResult<Title> {
    if store.get_title(id).await?.is_none() {
        return Err(title_not_found(id));
    }
    validate_title(store, &title).await?;
    let updated = store
        .update_title(id, title)
        .await?
        .ok_or_else(|| title_not_found(id))?;

    tracing::info!(title_id = id, "Title updated");
    Ok(updated)
}

pub async fn delete_title(store: &dyn CatalogStore, id: i64) -> AppResult<()> {
    if !store.delete_title(id).await? {
        return Err(title_not_found(id));
    }
    tracing::info!(title_id = id, "Title deleted with its reviews");
    Ok(())
}
