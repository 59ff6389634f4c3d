//! Administrative hierarchy shipped with the gateway.
//!
//! Provinces and districts are complete for the menus the gateway shows;
//! constituencies and wards are seeded for the districts with registered
//! branches. Operators extend the lower levels through
//! [`GeographyRepository`](crate::repository::GeographyRepository).

use rusqlite::Connection;

use ussd_core::error::UssdError;

/// Province -> districts.
const PROVINCES: &[(&str, &[&str])] = &[
    ("Central", &["Kabwe", "Mumbwa", "Chibombo", "Kapiri Mposhi", "Serenje", "Mkushi"]),
    ("Copperbelt", &["Ndola", "Kitwe", "Chingola", "Mufulira", "Luanshya", "Chililabombwe"]),
    ("Eastern", &["Chipata", "Petauke", "Katete", "Lundazi", "Nyimba", "Chadiza"]),
    ("Luapula", &["Mansa", "Samfya", "Kawambwa", "Nchelenge", "Mwense", "Chipili"]),
    ("Lusaka", &["Lusaka", "Kafue", "Chongwe", "Luangwa", "Chilanga", "Rufunsa"]),
    ("Muchinga", &["Chinsali", "Chama", "Isoka", "Nakonde", "Mafinga", "Shiwang'andu"]),
    ("Northern", &["Kasama", "Mbala", "Mpika", "Luwingu", "Mungwi", "Mporokoso"]),
    ("North-Western", &["Solwezi", "Kasempa", "Zambezi", "Mwinilunga", "Chavuma", "Kabompo"]),
    ("Southern", &["Livingstone", "Choma", "Monze", "Mazabuka", "Kalomo", "Namwala"]),
    ("Western", &["Mongu", "Senanga", "Kaoma", "Sesheke", "Lukulu", "Kalabo"]),
];

/// (province, district) -> constituency -> wards.
type ConstituencySeed = (&'static str, &'static [&'static str]);

const CONSTITUENCIES: &[(&str, &str, &[ConstituencySeed])] = &[
    (
        "Lusaka",
        "Lusaka",
        &[
            ("Chawama", &["Chawama", "John Howard", "Kuku"]),
            ("Kabwata", &["Kamwala", "Kabwata", "Libala", "Chilenje"]),
            ("Kanyama", &["Kanyama", "Munkolo", "Chinika"]),
            ("Lusaka Central", &["Rhodes Park", "Thorn Park", "Silwizya"]),
            ("Mandevu", &["Roma", "Mulungushi", "Ngwerere"]),
            ("Matero", &["Matero", "Lima", "Muchinga"]),
            ("Munali", &["Chainda", "Mtendere", "Kalingalinga"]),
        ],
    ),
    ("Lusaka", "Kafue", &[("Kafue", &["Chanyanya", "Kafue Estates", "Shimabala"])]),
    ("Lusaka", "Chongwe", &[("Chongwe", &["Chongwe", "Kanakantapa", "Nakatindi"])]),
    (
        "Copperbelt",
        "Ndola",
        &[
            ("Bwana Mkubwa", &["Kaloko", "Twapia"]),
            ("Chifubu", &["Chifubu", "Kanini"]),
            ("Kabushi", &["Kabushi", "Lubuto"]),
            ("Ndola Central", &["Kansenshi", "Itawa"]),
        ],
    ),
    (
        "Copperbelt",
        "Kitwe",
        &[
            ("Chimwemwe", &["Chimwemwe", "Kwacha East"]),
            ("Kamfinsa", &["Kamfinsa", "Riverside"]),
            ("Kwacha", &["Kwacha", "Ndeke"]),
            ("Nkana", &["Nkana East", "Nkana West"]),
            ("Wusakile", &["Wusakile", "Mindolo"]),
        ],
    ),
    ("Central", "Kabwe", &[("Bwacha", &["Bwacha", "Makululu"]), ("Kabwe Central", &["Kasanda", "Luangwa"])]),
    ("Eastern", "Chipata", &[("Chipata Central", &["Kapata", "Magazine"]), ("Luangeni", &["Kapatamoyo", "Mkanda"])]),
    ("Luapula", "Mansa", &[("Mansa Central", &["Chimese", "Mabumba"])]),
    ("Northern", "Kasama", &[("Kasama Central", &["Chiba", "Mulenga"]), ("Lukashya", &["Chisanga", "Misamfu"])]),
    ("North-Western", "Solwezi", &[("Solwezi Central", &["Kyawama", "Mapunga"])]),
    ("Southern", "Livingstone", &[("Livingstone", &["Dambwa", "Linda", "Maramba"])]),
    ("Western", "Mongu", &[("Mongu Central", &["Imwiko", "Lealui"])]),
];

/// Insert the shipped hierarchy. Existing rows are left untouched.
pub fn seed_geography(conn: &Connection) -> Result<(), UssdError> {
    let map_err = |e: rusqlite::Error| UssdError::Storage(format!("Failed to seed geography: {}", e));

    for (province, districts) in PROVINCES {
        conn.execute(
            "INSERT OR IGNORE INTO provinces (name) VALUES (?1)",
            rusqlite::params![province],
        )
        .map_err(map_err)?;
        let province_id: i64 = conn
            .query_row(
                "SELECT id FROM provinces WHERE name = ?1",
                rusqlite::params![province],
                |row| row.get(0),
            )
            .map_err(map_err)?;

        for district in *districts {
            conn.execute(
                "INSERT OR IGNORE INTO districts (province_id, name) VALUES (?1, ?2)",
                rusqlite::params![province_id, district],
            )
            .map_err(map_err)?;
        }
    }

    for (province, district, constituencies) in CONSTITUENCIES {
        let district_id: i64 = conn
            .query_row(
                "SELECT d.id FROM districts d JOIN provinces p ON p.id = d.province_id
                 WHERE p.name = ?1 AND d.name = ?2",
                rusqlite::params![province, district],
                |row| row.get(0),
            )
            .map_err(map_err)?;

        for (constituency, wards) in *constituencies {
            conn.execute(
                "INSERT OR IGNORE INTO constituencies (district_id, name) VALUES (?1, ?2)",
                rusqlite::params![district_id, constituency],
            )
            .map_err(map_err)?;
            let constituency_id: i64 = conn
                .query_row(
                    "SELECT id FROM constituencies WHERE district_id = ?1 AND name = ?2",
                    rusqlite::params![district_id, constituency],
                    |row| row.get(0),
                )
                .map_err(map_err)?;

            for ward in *wards {
                conn.execute(
                    "INSERT OR IGNORE INTO wards (constituency_id, name) VALUES (?1, ?2)",
                    rusqlite::params![constituency_id, ward],
                )
                .map_err(map_err)?;
            }
        }
    }

    Ok(())
}
