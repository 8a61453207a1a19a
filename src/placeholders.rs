//! Curated placeholder titles substituted whenever a live catalog query
//! fails or returns nothing usable, so the caller always has renderable
//! content. Substitution is an expected path, not an error path.

use crate::catalog::CategorySort;
use crate::types::{Title, TitleName};

struct Seed {
    id: i64,
    mal_id: i64,
    english: &'static str,
    romanized: &'static str,
    banner: &'static str,
    cover: &'static str,
    popularity: u64,
    score: u32,
    episodes: u32,
}

impl Seed {
    fn build(&self) -> Title {
        Title {
            id: self.id,
            mal_id: Some(self.mal_id),
            name: TitleName {
                preferred: Some(self.english.to_string()),
                english: Some(self.english.to_string()),
                romanized: Some(self.romanized.to_string()),
            },
            synopsis: None,
            genres: Vec::new(),
            banner_image: Some(self.banner.to_string()),
            cover_image: Some(self.cover.to_string()),
            status: None,
            start_date: None,
            end_date: None,
            episodes: Some(self.episodes),
            average_score: Some(self.score),
            popularity: Some(self.popularity),
            streaming_links: Vec::new(),
        }
    }
}

const FMA_BROTHERHOOD: Seed = Seed {
    id: 5114,
    mal_id: 5114,
    english: "Fullmetal Alchemist: Brotherhood",
    romanized: "Hagane no Renkinjutsushi: Fullmetal Alchemist",
    banner: "https://s4.anilist.co/file/anilistcdn/media/anime/banner/medium/b5114-3K02BC5T9Lm4.jpg",
    cover: "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx5114-044XJcY0Ppx2.jpg",
    popularity: 200_000,
    score: 90,
    episodes: 64,
};

const HUNTER_X_HUNTER: Seed = Seed {
    id: 11061,
    mal_id: 11061,
    english: "Hunter x Hunter",
    romanized: "Hunter x Hunter (2011)",
    banner: "https://s4.anilist.co/file/anilistcdn/media/anime/banner/large/bx11061-T0G8Ww2tngwF.jpg",
    cover: "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx11061-FC3i0kk9fFiA.png",
    popularity: 195_000,
    score: 91,
    episodes: 148,
};

const NARUTO: Seed = Seed {
    id: 20,
    mal_id: 20,
    english: "Naruto",
    romanized: "Naruto",
    banner: "https://s4.anilist.co/file/anilistcdn/media/anime/banner/large/bx20-qX18lGEXLFeW.jpg",
    cover: "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx20-YJvZ0pBrxG45.png",
    popularity: 250_000,
    score: 79,
    episodes: 220,
};

const COWBOY_BEBOP: Seed = Seed {
    id: 1,
    mal_id: 1,
    english: "Cowboy Bebop",
    romanized: "Cowboy Bebop",
    banner: "https://s4.anilist.co/file/anilistcdn/media/anime/banner/medium/b1-1X7W0dNwCrEq.jpg",
    cover: "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx1-v4bZr4rRbQCe.jpg",
    popularity: 150_000,
    score: 88,
    episodes: 26,
};

const ATTACK_ON_TITAN: Seed = Seed {
    id: 16498,
    mal_id: 16498,
    english: "Attack on Titan",
    romanized: "Shingeki no Kyojin",
    banner: "https://s4.anilist.co/file/anilistcdn/media/anime/banner/large/bx16498-ZhZkEg6MqxsK.jpg",
    cover: "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx16498-WPp7arbMP7CP.png",
    popularity: 210_000,
    score: 85,
    episodes: 25,
};

const GIRL_WHO_LEAPT: Seed = Seed {
    id: 2236,
    mal_id: 2236,
    english: "The Girl Who Leapt Through Time",
    romanized: "Toki wo Kakeru Shoujo",
    banner: "https://s4.anilist.co/file/anilistcdn/media/anime/banner/large/bx2236-hlLyC9+dIFE1.jpg",
    cover: "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx2236-s5KfuzMdGz3O.png",
    popularity: 80_000,
    score: 82,
    episodes: 1,
};

/// Placeholder page for one category sort.
pub fn for_category(sort: CategorySort) -> Vec<Title> {
    let seeds: &[&Seed] = match sort {
        CategorySort::Trending | CategorySort::Airing => &[&FMA_BROTHERHOOD, &HUNTER_X_HUNTER],
        CategorySort::Popularity => &[&NARUTO],
        CategorySort::Score => &[&COWBOY_BEBOP],
        CategorySort::Favourites => &[&ATTACK_ON_TITAN],
        CategorySort::Movies => &[&GIRL_WHO_LEAPT],
    };
    seeds.iter().map(|seed| seed.build()).collect()
}
