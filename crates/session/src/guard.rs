use core_types::View;

/// What the client should do when a view is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(View),
}

/// Views that need a signed-in user.
pub fn requires_session(view: View) -> bool {
    matches!(
        view,
        View::Dashboard | View::Strategy | View::Backtest | View::Pricing | View::Admin
    )
}

/// Decides whether `view` may be shown. Signed-out users are sent to the
/// login view and signed-in users skip it.
///
/// The admin view only needs a session here; the server decides whether the
/// session is allowed to see the directory.
pub fn guard(view: View, signed_in: bool) -> RouteDecision {
    match (view, signed_in) {
        (v, false) if requires_session(v) => RouteDecision::Redirect(View::Login),
        (View::Login, true) => RouteDecision::Redirect(View::Dashboard),
        _ => RouteDecision::Allow,
    }
}
