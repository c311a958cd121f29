//! The pre-`contents` specification shape.
//!
//! Older specifications named one application and placed it next to an
//! `/Applications` alias using an `icons` object. They are still accepted and
//! converted on parse.

use super::specification::{ContentEntry, ContentKind, DmgSpecification};
use serde::Deserialize;

/// Icon placement of a legacy specification.
#[derive(Clone, Debug, Deserialize)]
pub struct LegacyIcons {
    /// Icon size in points.
    pub size: Option<u32>,
    /// Position of the application.
    pub app: [i32; 2],
    /// Position of the `/Applications` alias.
    pub alias: [i32; 2],
}

/// Legacy specification as read from JSON.
#[derive(Clone, Debug, Deserialize)]
pub struct LegacySpecification {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub background: Option<String>,
    /// Path of the application bundle.
    pub app: Option<String>,
    pub icons: LegacyIcons,
    /// Additional files as `[path, x, y]`.
    #[serde(default)]
    pub extra: Vec<(String, i32, i32)>,
}

impl From<LegacySpecification> for DmgSpecification {
    fn from(legacy: LegacySpecification) -> Self {
        let entry = |x, y, kind, path| ContentEntry {
            x: Some(x),
            y: Some(y),
            kind: Some(kind),
            path,
            name: None,
        };

        let [alias_x, alias_y] = legacy.icons.alias;
        let [app_x, app_y] = legacy.icons.app;
        let mut contents = vec![
            entry(alias_x, alias_y, ContentKind::Link, Some("/Applications".to_string())),
            entry(app_x, app_y, ContentKind::File, legacy.app),
        ];
        contents.extend(
            legacy
                .extra
                .into_iter()
                .map(|(path, x, y)| entry(x, y, ContentKind::File, Some(path))),
        );

        DmgSpecification {
            title: legacy.title,
            icon: legacy.icon,
            background: legacy.background,
            icon_size: legacy.icons.size,
            contents: Some(contents),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_legacy_layout_to_contents() {
        let json = br#"{
            "title": "Test Title",
            "icon": "TestIcon.icns",
            "background": "TestBkg.png",
            "app": "TestApp.app",
            "icons": { "size": 80, "app": [192, 344], "alias": [448, 344] },
            "extra": [ ["TestDoc.txt", 512, 128] ]
        }"#;

        let layout = DmgSpecification::from_json_slice(json)
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(layout.icon_size, 80);
        assert_eq!(layout.contents.len(), 3);
        assert_eq!(layout.contents[0].kind, ContentKind::Link);
        assert_eq!(layout.contents[0].path, "/Applications");
        assert_eq!((layout.contents[1].x, layout.contents[1].y), (192, 344));
        assert_eq!(layout.contents[1].name, "TestApp.app");
        assert_eq!(layout.contents[2].path, "TestDoc.txt");
        assert_eq!((layout.contents[2].x, layout.contents[2].y), (512, 128));
    }

    #[test]
    fn legacy_without_app_fails_validation() {
        let json = br#"{ "title": "T", "icons": { "app": [1, 2], "alias": [3, 4] } }"#;
        let err = DmgSpecification::from_json_slice(json)
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("contents.1.path"));
    }
}
