/// Declare a config section with its defaults inline
///
/// `field: Type = default` expands to a public field plus the matching entry
/// in `Default::default()`. The struct is `#[serde(default)]`, so a TOML
/// file only needs the keys it overrides; `PartialEq` lets `reload_config`
/// tell whether anything changed.
///
/// ```ignore
/// config_struct! {
///     pub struct CacheConfig {
///         file_path: String = "data/rewards_cache.json".to_string(),
///         persist: bool = true,
///     }
/// }
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $( $(#[$field_meta])* pub $field: $ty, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $( $field: $default, )* }
            }
        }
    };
}
