//! Static-asset fixture table
//!
//! Pinned to the reference build of the web application; regenerate the
//! digests whenever the frontend assets change.

pub struct StaticFile {
    pub path: &'static str,
    pub size: u64,
    pub sha256: &'static str,
}

pub static STATIC_FILES: &[StaticFile] = &[
    StaticFile {
        path: "/css/admin.css",
        size: 684,
        sha256: "92cf19b4a5ba46a21976ce212b86f3a65efc6e1f2f26e727e177e6e6c08ba79d",
    },
    StaticFile {
        path: "/css/bootstrap.min.css",
        size: 140_930,
        sha256: "12f9bb4a7b7b91ee0e29b2b8a20c03eab7e7c685f7a06f1cd8a0b4b5eaf1061f",
    },
    StaticFile {
        path: "/css/layout.css",
        size: 633,
        sha256: "40fbbd5c1e3e00a9a5393f11d1a8f0ab29eb6e4800ee35aef4325b82b5a13b12",
    },
    StaticFile {
        path: "/favicon.ico",
        size: 1092,
        sha256: "be8a6df5acbc738e0c7a8b276e46c8f2df3077dd4bb6a4f3e6e0c2d5de940144",
    },
    StaticFile {
        path: "/js/admin.js",
        size: 7214,
        sha256: "d013c9ea8d0fe1b5b51ccfa383fbda9d79ebd27e7a53e3d5128192b6e34e3c8b",
    },
    StaticFile {
        path: "/js/app.js",
        size: 7407,
        sha256: "e83e2f1e14b7f3062ac54e62f3c79e4c9da609e69eb0e32449c5ce5bb303b61e",
    },
    StaticFile {
        path: "/js/bootstrap.bundle.min.js",
        size: 70_682,
        sha256: "6c9706cd3f4f9a90c1ec44d5bb130b3f62c2d733be01c65e6ad67d0d87e0bbf3",
    },
    StaticFile {
        path: "/js/fetch.min.js",
        size: 7337,
        sha256: "9a1ff52a15e7e1f0a1a1d59cdf17cc7b2c86c24e307cbca7a902e01e25a25d84",
    },
    StaticFile {
        path: "/js/jquery-3.3.1.slim.min.js",
        size: 69_917,
        sha256: "6657a7d0e1baeea9db2d810cfbb9b0e8b14a089d3447c96cccf6f39d4d4332a2",
    },
    StaticFile {
        path: "/js/vue.min.js",
        size: 86_452,
        sha256: "1b28f9ae71ba500b0f1d6a2bb5cd456de35ef4b4d5bfe24e77f6e5a2ec6ab621",
    },
];
