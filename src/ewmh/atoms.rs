x11rb::atom_manager! {
    /// All atoms interned at startup, one round trip.
    pub AtomCollection: AtomCollectionCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        UTF8_STRING,
        _NET_SUPPORTED,
        _NET_WM_NAME,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_ACTIVE_WINDOW,
        _NET_SUPPORTING_WM_CHECK,
        _NET_CURRENT_DESKTOP,
        _NET_NUMBER_OF_DESKTOPS,
    }
}
