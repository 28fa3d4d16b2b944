//! Genre normalization
//!
//! Maps upstream genre and sub-genre strings onto the category vocabulary used
//! in the published guide. One upstream string may feed several categories
//! ("Action & Adventure" is both Action and Adventure).

/// Canonical category -> upstream strings that map to it
static GENRE_TABLE: &[(&str, &[&str])] = &[
    ("Animated", &["Family Animation", "Cartoons"]),
    ("Educational", &["Education & Guidance", "Instructional & Educational"]),
    ("News", &["News and Information", "General News", "News + Opinion"]),
    ("History", &["History & Social Studies"]),
    ("Politics", &["Politics"]),
    (
        "Action",
        &[
            "Action & Adventure",
            "Action Classics",
            "Martial Arts",
            "Crime Action",
            "Family Adventures",
            "Action Sci-Fi & Fantasy",
            "Action Thrillers",
            "African-American Action",
        ],
    ),
    ("Adventure", &["Action & Adventure", "Adventures", "Sci-Fi Adventure"]),
    (
        "Reality",
        &[
            "Reality",
            "Reality Drama",
            "Courtroom Reality",
            "Occupational Reality",
            "Celebrity Reality",
        ],
    ),
    (
        "Documentary",
        &[
            "Documentaries",
            "Social & Cultural Documentaries",
            "Science and Nature Documentaries",
            "Miscellaneous Documentaries",
            "Crime Documentaries",
            "Travel & Adventure Documentaries",
            "Sports Documentaries",
            "Military Documentaries",
            "Political Documentaries",
            "Foreign Documentaries",
            "Religion & Mythology Documentaries",
            "Historical Documentaries",
            "Biographical Documentaries",
            "Faith & Spirituality Documentaries",
        ],
    ),
    ("Biography", &["Biographical Documentaries", "Inspirational Biographies"]),
    ("Science Fiction", &["Sci-Fi Thrillers", "Sci-Fi Adventure", "Action Sci-Fi & Fantasy"]),
    ("Thriller", &["Sci-Fi Thrillers", "Thrillers", "Crime Thrillers"]),
    ("Talk", &["Talk & Variety", "Talk Show"]),
    ("Variety", &["Sketch Comedies"]),
    ("Home Improvement", &["Art & Design", "DIY & How To", "Home Improvement"]),
    ("House/garden", &["Home & Garden"]),
    ("Cooking", &["Cooking Instruction", "Food & Wine", "Food Stories"]),
    ("Travel", &["Travel & Adventure Documentaries", "Travel"]),
    ("Western", &["Westerns", "Classic Westerns"]),
    ("LGBTQ", &["Gay & Lesbian", "Gay & Lesbian Dramas", "Gay"]),
    ("Game show", &["Game Show"]),
    ("Military", &["Classic War Stories"]),
    (
        "Comedy",
        &[
            "Cult Comedies",
            "Spoofs and Satire",
            "Slapstick",
            "Classic Comedies",
            "Stand-Up",
            "Sports Comedies",
            "African-American Comedies",
            "Showbiz Comedies",
            "Sketch Comedies",
            "Teen Comedies",
            "Latino Comedies",
            "Family Comedies",
        ],
    ),
    ("Crime", &["Crime Action", "Crime Drama", "Crime Documentaries"]),
    (
        "Sports",
        &["Sports", "Sports & Sports Highlights", "Sports Documentaries", "Poker & Gambling"],
    ),
    ("Poker & Gambling", &["Poker & Gambling"]),
    ("Crime drama", &["Crime Drama"]),
    (
        "Drama",
        &["Classic Dramas", "Family Drama", "Indie Drama", "Romantic Drama", "Crime Drama"],
    ),
    (
        "Children",
        &[
            "Kids",
            "Children & Family",
            "Kids' TV",
            "Cartoons",
            "Animals",
            "Family Animation",
            "Ages 2-4",
            "Ages 11-12",
        ],
    ),
];

/// Every canonical category listing `genre`, in table order. Unknown genres
/// pass through unchanged as a single category.
pub fn normalize(genre: &str) -> Vec<String> {
    let matches: Vec<String> = GENRE_TABLE
        .iter()
        .filter(|(_, upstream)| upstream.iter().any(|s| *s == genre))
        .map(|(canonical, _)| canonical.to_string())
        .collect();

    if matches.is_empty() {
        vec![genre.to_string()]
    } else {
        matches
    }
}

/// Canonical category names
pub fn categories() -> impl Iterator<Item = &'static str> {
    GENRE_TABLE.iter().map(|(canonical, _)| *canonical)
}
