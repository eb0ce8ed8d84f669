/// Presentation of the externally supplied live/offline signal. Holds no
/// state of its own; callers re-render whenever the signal changes.
pub struct ConnectionStateIndicator;

impl ConnectionStateIndicator {
    pub fn label(live: bool) -> &'static str {
        if live { "Live" } else { "Offline" }
    }

    pub fn css_class(live: bool) -> &'static str {
        if live {
            "indicator-live"
        } else {
            "indicator-offline"
        }
    }
}
