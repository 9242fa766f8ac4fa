// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::driver::{DriverRecord, DriverStatus};

pub fn get_roster_as_json<'a>() -> &'a str {
    r#"
    [
        {
            "id": "d1",
            "fullName": "Raj",
            "phoneNumber": "555-1",
            "route": "Main Gate - Hostel",
            "status": "online"
        },
        {
            "id": "d2",
            "name": "Meera",
            "phone": "555-2",
            "status": "Offline"
        }
    ]
    "#
}

pub fn get_drivers() -> Vec<DriverRecord> {
    vec![
        DriverRecord {
            id: "d1".to_string(),
            name: "Raj".to_string(),
            phone: "555-1".to_string(),
            route: "Main Gate - Hostel".to_string(),
            status: DriverStatus::Active,
        },
        DriverRecord {
            id: "d2".to_string(),
            name: "Meera".to_string(),
            phone: "555-2".to_string(),
            route: "Not specified".to_string(),
            status: DriverStatus::Offline,
        },
    ]
}
